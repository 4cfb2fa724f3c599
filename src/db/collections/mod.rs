pub mod food_log;
pub mod opaque;
pub mod perishables;
pub mod settings;
pub mod weight;

pub use food_log::FoodLogEntry;
pub use opaque::OpaqueDocument;
pub use perishables::PerishableItem;
pub use settings::UserSettings;
pub use weight::WeightEntry;
