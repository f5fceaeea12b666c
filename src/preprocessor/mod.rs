pub mod directive;
pub mod encoding;
pub mod expand;
pub mod if_expr;
pub mod lexer;
pub mod macros;
pub mod pre_token;
pub mod punctuator;
pub mod reader;

pub use directive::Directives;
pub use pre_token::{HideSet, Parts, PreToken, PreTokenKind};
pub use punctuator::Punctuator;
