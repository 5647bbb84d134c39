//! Access layer: tuple-oriented operations over heap files.
//!
//! - **HeapFile**: one logical table mapped onto a page-organized file,
//!   with insert, delete, and page-level read/write
//! - **HeapScan**: stateful cursor yielding tuples in page order
//! - **Tuple** / **RecordId**: records and their stored locations
//! - **Value** / **DataType** / **TupleDesc**: the fixed-width type system
//!   tuples are encoded with

pub mod heap;
pub mod scan;
pub mod tuple;
pub mod value;

pub use heap::HeapFile;
pub use scan::HeapScan;
pub use tuple::{RecordId, Tuple};
pub use value::{deserialize_tuple, serialize_tuple, DataType, TupleDesc, Value};
