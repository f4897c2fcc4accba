use crate::core::config::data::{path_display, Config};

impl Config {
    /// Prints the values that are only changed by editing `config.toml` or
    /// the environment.
    pub fn print_environment(&self) {
        let key_state = if self.api_key().is_some() {
            "set"
        } else {
            "not set"
        };
        println!("  api-key-env: {} ({key_state})", self.api_key_env());
        match self.data_dir() {
            Some(dir) => println!("  data-dir: {}", path_display(dir)),
            None => println!("  data-dir: (unavailable)"),
        }
        if self.system_instruction.is_some() {
            println!("  system-instruction: (custom)");
        } else {
            println!("  system-instruction: (built-in)");
        }
    }
}
