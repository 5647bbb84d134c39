pub mod page_file;

pub use page_file::{page_count_for_len, page_offset, PageFile, PAGE_SIZE};
