use serde::{Deserialize, Serialize};

/// Element type codes carried by model operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrecisionCode {
    Bool8,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float16,
    Float32,
    Float64,
    QuantInt8SymmPerLayer,
    QuantInt8SymmPerChannel,
    QuantUInt8AsymmPerLayer,
    QuantInt32SymmPerLayer,
    QuantInt32SymmPerChannel,
}

impl PrecisionCode {
    /// Storage size of one element in bytes.
    pub fn size_in_bytes(self) -> usize {
        match self {
            PrecisionCode::Bool8
            | PrecisionCode::Int8
            | PrecisionCode::UInt8
            | PrecisionCode::QuantInt8SymmPerLayer
            | PrecisionCode::QuantInt8SymmPerChannel
            | PrecisionCode::QuantUInt8AsymmPerLayer => 1,
            PrecisionCode::Int16 | PrecisionCode::UInt16 | PrecisionCode::Float16 => 2,
            PrecisionCode::Int32
            | PrecisionCode::UInt32
            | PrecisionCode::Float32
            | PrecisionCode::QuantInt32SymmPerLayer
            | PrecisionCode::QuantInt32SymmPerChannel => 4,
            PrecisionCode::Int64 | PrecisionCode::UInt64 | PrecisionCode::Float64 => 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_sizes_follow_storage_width() {
        assert_eq!(PrecisionCode::Bool8.size_in_bytes(), 1);
        assert_eq!(PrecisionCode::Float16.size_in_bytes(), 2);
        assert_eq!(PrecisionCode::QuantInt32SymmPerChannel.size_in_bytes(), 4);
        assert_eq!(PrecisionCode::UInt64.size_in_bytes(), 8);
    }
}
