mod parser;
mod types;

pub use parser::{load_settings, parse_settings_str, save_settings};
pub use types::{
    FieldDefault, FieldSchema, RawSettings, Settings, DEFAULT_PAGE_SIZE, DEFAULT_RECORD_TYPE,
};
