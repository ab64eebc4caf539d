use std::collections::HashMap;
use std::sync::Arc;

use crate::interfaces::handler::RequestHandler;

/// Request type to handler. Filled during startup, then shared read-only.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<i32, Arc<dyn RequestHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register_handler(&mut self, handler: Arc<dyn RequestHandler>) -> bool {
        let request_type = handler.request_type();
        if self.handlers.contains_key(&request_type) {
            return false;
        }
        self.handlers.insert(request_type, handler);
        true
    }

    pub fn get(&self, request_type: i32) -> Option<Arc<dyn RequestHandler>> {
        self.handlers.get(&request_type).cloned()
    }

    pub fn request_types(&self) -> Vec<i32> {
        let mut types: Vec<i32> = self.handlers.keys().copied().collect();
        types.sort_unstable();
        types
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
