mod i2c_error;
use i2c_error::sr1_status;

mod i2c_irq;
pub use i2c_irq::I2cIrqMaster;

mod segment_port;
pub use segment_port::SegmentPort;
