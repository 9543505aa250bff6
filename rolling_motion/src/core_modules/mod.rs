pub mod column_delta;
pub mod frame;
pub mod rect;
pub mod rect_merger;
pub mod ring_buffer;
pub mod rolling_sum;
pub mod row_scanner;
