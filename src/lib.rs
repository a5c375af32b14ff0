//! Vibromon: Vibration Sensor Monitoring & Anomaly Detection
//!
//! Polls a WTVB01-485-class vibration/temperature sensor over a half-duplex
//! Modbus RTU serial link, buffers decoded samples, and runs a streaming
//! statistical anomaly engine across the sensor's physical axes.
//!
//! ## Architecture
//!
//! - **Protocol**: pure frame codec (CRC-16, 0x03/0x06) and register map
//! - **Transport**: one request/response exchange per call over a serial seam
//! - **Collector**: background polling worker feeding the shared buffer
//! - **Baseline / Detector**: quiescent-window profiling, derived thresholds,
//!   and a debounced hysteretic per-axis state machine
//!
//! Presentation layers (dashboards, exporters) consume the read-only query
//! surface: buffer snapshots, collector statistics, detector thresholds and
//! evaluation reports.

pub mod baseline;
pub mod buffer;
pub mod collector;
pub mod config;
pub mod detector;
pub mod features;
pub mod protocol;
pub mod transport;
pub mod types;

// Re-export core data types
pub use types::{Axis, Sample};

// Re-export the query surface and session components
pub use buffer::{ChannelStats, SampleBuffer, TriAxisStats};
pub use collector::{
    CollectorError, CollectorEvent, CollectorState, CollectorStatistics, ErrorKind,
    PollingCollector,
};
pub use transport::{SerialLink, SerialPortLink, SerialTransport, TransportError};

// Re-export the analysis engine
pub use baseline::{AxisFeatures, BaselineError, BaselineModel, BaselineProfile};
pub use detector::{
    aggregate_score, AnomalyDetector, AxisMetrics, AxisState, AxisStatus, EvaluationReport,
    MetricKind, ThresholdPolicy, ThresholdSet, ThresholdTable,
};

// Re-export configuration
pub use config::{ConfigError, MonitorConfig};

// Re-export protocol-level errors for event consumers
pub use protocol::FrameError;
