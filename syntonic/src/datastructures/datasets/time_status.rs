/// A nanosecond value with 16 bits of fraction and a 16-bit extension of
/// the integer part, as used for grandmaster phase changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScaledNs {
    pub nanoseconds_msb: u16,
    pub nanoseconds_lsb: u64,
    pub fractional_nanoseconds: u16,
}

impl ScaledNs {
    pub(crate) fn serialize(&self, buffer: &mut [u8]) {
        buffer[0..2].copy_from_slice(&self.nanoseconds_msb.to_be_bytes());
        buffer[2..10].copy_from_slice(&self.nanoseconds_lsb.to_be_bytes());
        buffer[10..12].copy_from_slice(&self.fractional_nanoseconds.to_be_bytes());
    }
}

/// Rate and phase information about the grandmaster, accumulated from
/// FOLLOW_UP information TLVs.
///
/// The rest of the TIME_STATUS_NP management payload (master offset,
/// ingress time, gmPresent) is derived from the aggregator's live state
/// when a response is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeStatus {
    pub cumulative_scaled_rate_offset: i32,
    pub scaled_last_gm_phase_change: i32,
    pub gm_time_base_indicator: u16,
    pub last_gm_phase_change: ScaledNs,
}
