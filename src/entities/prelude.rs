pub use super::crops::Entity as Crops;
