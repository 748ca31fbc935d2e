pub mod category;
pub mod stock_item;
