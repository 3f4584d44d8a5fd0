//! Collection decorators.
//!
//! Each decorator wraps an inner [`Collection`](crate::collection::Collection)
//! and adds one concern. The pipeline builder stacks them as
//! store → cache → defaults → soft delete → timing.

mod cache;
mod defaults;
mod soft_delete;
mod timing;

pub use cache::CacheDecorator;
pub use defaults::FillDefaultsDecorator;
pub use soft_delete::SoftDeleteDecorator;
pub use timing::TimingDecorator;
