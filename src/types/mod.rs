mod data_type;
mod models;

pub use data_type::DataType;
pub use models::{Application, Attribute, Organisation, Token, TreeFields};
