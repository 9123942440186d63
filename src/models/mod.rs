mod payment;
mod price;
mod product;
mod subscription;
mod user;

pub use payment::*;
pub use price::*;
pub use product::*;
pub use subscription::*;
pub use user::*;
