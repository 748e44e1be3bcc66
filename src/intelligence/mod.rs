//! Device intelligence: turning port and HTTP evidence into device labels

pub mod classifier;

pub use classifier::{
    classify, Classification, DeviceClassifier, DeviceType, Evidence, RuleClassifier,
    UNKNOWN_MANUFACTURER,
};
