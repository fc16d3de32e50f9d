//! imagepin マニフェスト
//!
//! `imagepin.kdl` に書かれた公開先イメージ・ビルド設定・追跡するパッケージを
//! 読み込みます。ファイルが無い場合は spatialdata イメージ用の既定値を使います。

pub mod discovery;
pub mod error;
pub mod model;
pub mod parser;

pub use discovery::*;
pub use error::*;
pub use model::*;
pub use parser::*;
