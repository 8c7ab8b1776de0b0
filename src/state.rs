use std::path::PathBuf;

use crate::chat::ChatService;

// app's shared state
pub struct AppState {
    pub chat: ChatService,
    pub static_dir: PathBuf, // root for `/` and `/static/*`
    pub index_file: String,  // served at `/`
}
