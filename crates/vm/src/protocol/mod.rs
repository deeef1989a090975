mod iter;

pub use iter::{PyIterIter, PyIterReturn};
