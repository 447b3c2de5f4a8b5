pub mod csg_kernel;
pub mod mock_kernel;
pub mod primitives;
mod sweep;
pub mod tessellation;
pub mod traits;
pub mod transform;
pub mod truck_kernel;
pub mod types;

pub use csg_kernel::{CsgKernel, DEFAULT_CHORD_TOLERANCE};
pub use mock_kernel::{MockKernel, MockOp};
pub use traits::*;
pub use transform::Transform;
pub use truck_kernel::TruckKernel;
pub use types::*;
