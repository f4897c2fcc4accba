//! Registry of setting handlers.

use std::collections::HashMap;

use super::handlers::{
    base_url_handler, model_handler, user_name_handler, DarkModeHandler, LanguageHandler,
    TemperatureHandler, TurnTimeoutHandler,
};
use super::SettingHandler;

/// Registry of all available setting handlers.
pub struct SettingRegistry {
    handlers: HashMap<&'static str, Box<dyn SettingHandler>>,
    /// Keys in display order for `parley set` output.
    display_order: Vec<&'static str>,
}

impl SettingRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            handlers: HashMap::new(),
            display_order: Vec::new(),
        };

        // Preferences first, then backend configuration
        registry.register(Box::new(user_name_handler()));
        registry.register(Box::new(DarkModeHandler));
        registry.register(Box::new(LanguageHandler));
        registry.register(Box::new(model_handler()));
        registry.register(Box::new(base_url_handler()));
        registry.register(Box::new(TemperatureHandler));
        registry.register(Box::new(TurnTimeoutHandler));

        registry
    }

    fn register(&mut self, handler: Box<dyn SettingHandler>) {
        let key = handler.key();
        self.display_order.push(key);
        self.handlers.insert(key, handler);
    }

    pub fn get(&self, key: &str) -> Option<&dyn SettingHandler> {
        self.handlers.get(key).map(|h| h.as_ref())
    }

    pub fn keys_display_order(&self) -> &[&'static str] {
        &self.display_order
    }
}

impl Default for SettingRegistry {
    fn default() -> Self {
        Self::new()
    }
}
