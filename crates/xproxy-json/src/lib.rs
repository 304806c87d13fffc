mod path;
mod repair;
mod walk;

pub use path::{
    delete_path, get_bool, get_f64, get_i64, get_path, get_path_mut, get_str, set_path,
};
pub use repair::repair_json;
pub use walk::walk_key;
