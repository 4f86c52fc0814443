// Purpose - external interfaces: where the bells' samples go

pub mod device;
pub mod sink;

pub use device::{DeviceOutput, DeviceSink, DeviceSinkFactory};
pub use sink::{
    AudioSink, NullSink, PacedSink, RecordedNote, Recorder, RecordingSink, SinkError, SinkFactory,
};
