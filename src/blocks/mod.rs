//! Built-in block types
//!
//! Each type registers its `type_name` and `version` tag at startup; the
//! runtime looks types up by tag when loading a persisted configuration.

pub mod counter;
pub mod gpio_do;
pub mod toggle;

use std::sync::Arc;

use crate::core::registry::{RegistryError, TypeRegistry};
use crate::hal::GpioProvider;

pub use counter::Counter;
pub use gpio_do::GpioDigitalOutput;
pub use toggle::Toggle;

/// Register every built-in block type. GPIO-backed types close over the
/// provider that will hand them their pins.
pub fn register_builtins(
    types: &mut TypeRegistry,
    gpio: Arc<dyn GpioProvider>,
) -> Result<(), RegistryError> {
    types.register(
        counter::TYPE_NAME,
        counter::VERSION,
        Box::new(|| Box::new(Counter::new())),
    )?;
    types.register(
        toggle::TYPE_NAME,
        toggle::VERSION,
        Box::new(|| Box::new(Toggle::new())),
    )?;
    types.register(
        gpio_do::TYPE_NAME,
        gpio_do::VERSION,
        Box::new(move || Box::new(GpioDigitalOutput::new(gpio.clone()))),
    )?;
    Ok(())
}
