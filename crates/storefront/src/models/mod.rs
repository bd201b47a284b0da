//! Domain models for the storefront.
//!
//! These are validated domain objects, separate from the private row types
//! the repositories decode. Most of them serialize straight to the JSON API.

pub mod address;
pub mod cart;
pub mod catalog;
pub mod order;
pub mod referral;
pub mod session;
pub mod user;

pub use address::{Address, AddressInput, AddressSnapshot};
pub use cart::{CartLine, CartOwner, CartView};
pub use catalog::{Category, CategoryInput, Page, Product, ProductFilter, ProductInput, ProductSort};
pub use order::{NewOrder, NewOrderItem, Order, OrderItem, OrderWithItems};
pub use referral::{NewReferral, Referral};
pub use session::{CurrentUser, keys as session_keys};
pub use user::User;
