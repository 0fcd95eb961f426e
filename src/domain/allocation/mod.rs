// Translates scored-strategy weights into target positions and orders.
pub mod allocator;
