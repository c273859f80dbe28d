pub mod cart;
pub mod item;
pub mod order;
pub mod payment;

pub use cart::CartEntry;
pub use item::{Item, ItemPage, ItemQuery, SortBy};
pub use order::{Order, OrderError, OrderLineItem, OrderStatus, PricedLine};
pub use payment::{Payment, PaymentError, PaymentStatus};
