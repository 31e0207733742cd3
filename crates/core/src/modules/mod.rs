pub mod fixture_module;
pub mod module_manager;
pub mod traits;

pub use fixture_module::FixtureModule;
pub use module_manager::ModuleManager;
pub use traits::{AsyncModule, ModuleEvent, ModuleId, ModuleMessage};
