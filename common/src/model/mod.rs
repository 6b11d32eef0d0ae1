pub mod draft;
pub mod export;
pub mod template;
pub mod variable;
