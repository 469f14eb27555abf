//! Physical-unit ↔ LSB conversion for the AWR2243 DFP register interface.
//!
//! The transceiver firmware takes every timing and frequency parameter as an
//! integer count of a fixed LSB quantum. The quanta below come from the DFP
//! 2.2 interface documentation:
//!
//! | register            | 1 LSB          |
//! |---------------------|----------------|
//! | `startFreqConst`    | 53.6441803 Hz  |
//! | `freqSlopeConst`    | 48.2797623 kHz/µs |
//! | timing constants    | 10 ns          |
//! | `framePeriodicity`  | 5 ns           |
//!
//! Forward conversion truncates toward zero after the floating-point
//! arithmetic (the same semantics as the reference tool's integer cast). The
//! inverse conversions are exact algebraic inverses with no re-rounding, so a
//! round trip recovers the physical value to within one LSB.

use crate::lua::Literal;
use std::collections::BTreeMap;

/// Start-frequency LSB in Hz.
pub const FREQ_LSB_HZ: f64 = 53.6441803;
/// Frequency-slope LSB in kHz/µs.
pub const SLOPE_LSB_KHZ_PER_US: f64 = 48.2797623;
/// Timing-constant LSB in µs (10 ns).
pub const TIME_LSB_US: f64 = 0.01;
/// Frame-periodicity LSB in ns.
pub const FRAME_PERIOD_LSB_NS: f64 = 5.0;

/// A firmware register field produced by unit conversion. Each field lives
/// either in the profile block or the frame block of the canonical
/// configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FirmwareField {
    StartFreqConst,
    FreqSlopeConst,
    IdleTimeConst,
    AdcStartTimeConst,
    RampEndTime,
    NumAdcSamples,
    DigOutSampleRate,
    RxGain,
    ChirpStartIdx,
    ChirpEndIdx,
    NumLoops,
    NumFrames,
    FramePeriodicity,
}

/// One converted register value, ready to overlay onto the canonical
/// configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConvertedParam {
    pub field: FirmwareField,
    pub value: i64,
}

// ---------------------------------------------------------------------------
// Forward conversions (physical unit → LSB count)
// ---------------------------------------------------------------------------

/// GHz → `startFreqConst` LSBs.
pub fn ghz_to_freq_lsb(ghz: f64) -> i64 {
    (ghz * 1e9 / FREQ_LSB_HZ) as i64
}

/// MHz/µs → `freqSlopeConst` LSBs.
pub fn mhz_per_us_to_slope_lsb(slope: f64) -> i64 {
    (slope * 1000.0 / SLOPE_LSB_KHZ_PER_US) as i64
}

/// µs → 10 ns timing LSBs (`idleTimeConst`, `adcStartTimeConst`, `rampEndTime`).
pub fn us_to_time_lsb(us: f64) -> i64 {
    (us / TIME_LSB_US) as i64
}

/// ms → `framePeriodicity` LSBs (5 ns each).
pub fn ms_to_frame_period_lsb(ms: f64) -> i64 {
    (ms * 1e6 / FRAME_PERIOD_LSB_NS) as i64
}

// ---------------------------------------------------------------------------
// Inverse conversions (LSB count → physical unit), used by the descriptor
// serializer. Exact inverses: division reinstated, never re-rounded.
// ---------------------------------------------------------------------------

/// `startFreqConst` LSBs → GHz.
pub fn freq_lsb_to_ghz(lsb: u32) -> f64 {
    lsb as f64 * FREQ_LSB_HZ / 1e9
}

/// `freqSlopeConst` LSBs → MHz/µs.
pub fn slope_lsb_to_mhz_per_us(lsb: i16) -> f64 {
    lsb as f64 * SLOPE_LSB_KHZ_PER_US / 1000.0
}

/// 10 ns timing LSBs → µs.
pub fn time_lsb_to_us(lsb: u32) -> f64 {
    lsb as f64 * TIME_LSB_US
}

/// `framePeriodicity` LSBs → ms.
pub fn frame_period_lsb_to_ms(lsb: u32) -> f64 {
    lsb as f64 * FRAME_PERIOD_LSB_NS / 1e6
}

// ---------------------------------------------------------------------------
// Named-parameter table
// ---------------------------------------------------------------------------

/// Convert every recognized physical parameter to its firmware field.
///
/// Unrecognized names are ignored — scripts routinely carry parameters this
/// tool has no register for, and they must not break the pipeline.
/// Non-numeric values for recognized names are likewise skipped.
pub fn convert_params(params: &BTreeMap<String, Literal>) -> Vec<ConvertedParam> {
    use FirmwareField::*;

    // (source parameter, target field, physical → LSB formula)
    const TABLE: [(&str, FirmwareField, fn(f64) -> i64); 13] = [
        ("start_freq", StartFreqConst, ghz_to_freq_lsb),
        ("slope", FreqSlopeConst, mhz_per_us_to_slope_lsb),
        ("idle_time", IdleTimeConst, us_to_time_lsb),
        ("adc_start_time", AdcStartTimeConst, us_to_time_lsb),
        ("ramp_end_time", RampEndTime, us_to_time_lsb),
        ("adc_samples", NumAdcSamples, identity_lsb),
        ("sample_freq", DigOutSampleRate, identity_lsb),
        ("rx_gain", RxGain, identity_lsb),
        ("start_chirp_tx", ChirpStartIdx, identity_lsb),
        ("end_chirp_tx", ChirpEndIdx, identity_lsb),
        ("nchirp_loops", NumLoops, identity_lsb),
        ("nframes_master", NumFrames, identity_lsb),
        ("Inter_Frame_Interval", FramePeriodicity, ms_to_frame_period_lsb),
    ];

    let mut converted = Vec::new();
    for (name, field, formula) in TABLE {
        if let Some(value) = params.get(name).and_then(Literal::as_f64) {
            converted.push(ConvertedParam {
                field,
                value: formula(value),
            });
        }
    }
    converted
}

/// Already register-valued parameters (sample counts, gains, indices).
fn identity_lsb(value: f64) -> i64 {
    value as i64
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_freq_79ghz() {
        // trunc(79.0e9 / 53.6441803)
        let lsb = ghz_to_freq_lsb(79.0);
        assert_eq!(lsb, 1_472_666_737);
        // inverse recovers the physical value to well within 1 LSB
        let ghz = freq_lsb_to_ghz(lsb as u32);
        assert!((ghz - 79.0).abs() < 1e-6, "round trip gave {ghz}");
    }

    #[test]
    fn slope_conversion() {
        let lsb = mhz_per_us_to_slope_lsb(65.854);
        assert_eq!(lsb, 1364);
        let back = slope_lsb_to_mhz_per_us(lsb as i16);
        // one slope LSB is ~0.048 MHz/µs
        assert!((back - 65.854).abs() <= SLOPE_LSB_KHZ_PER_US / 1000.0);
    }

    #[test]
    fn timing_conversions() {
        assert_eq!(us_to_time_lsb(3.0), 300);
        assert_eq!(us_to_time_lsb(28.0), 2800);
        assert_eq!(ms_to_frame_period_lsb(50.0), 10_000_000);
        assert_eq!(ms_to_frame_period_lsb(100.0), 20_000_000);
    }

    #[test]
    fn truncation_toward_zero() {
        // 6.999 µs is 699.9 LSBs; the cast truncates, it does not round up.
        assert_eq!(us_to_time_lsb(6.999), 699);
    }

    #[test]
    fn round_trip_within_one_lsb() {
        for &ghz in &[76.0, 77.0, 79.0, 80.999] {
            let back = freq_lsb_to_ghz(ghz_to_freq_lsb(ghz) as u32);
            assert!((back - ghz).abs() <= FREQ_LSB_HZ / 1e9);
        }
        for &slope in &[5.0, 15.0148, 65.854, 99.9] {
            let back = slope_lsb_to_mhz_per_us(mhz_per_us_to_slope_lsb(slope) as i16);
            assert!((back - slope).abs() <= SLOPE_LSB_KHZ_PER_US / 1000.0);
        }
        for &us in &[0.0, 3.0, 5.5, 40.0, 99.99] {
            let back = time_lsb_to_us(us_to_time_lsb(us) as u32);
            assert!((back - us).abs() <= TIME_LSB_US);
        }
        for &ms in &[20.0, 50.0, 100.0, 333.3] {
            let back = frame_period_lsb_to_ms(ms_to_frame_period_lsb(ms) as u32);
            assert!((back - ms).abs() <= FRAME_PERIOD_LSB_NS / 1e6);
        }
    }

    #[test]
    fn unknown_names_are_ignored() {
        let mut params = BTreeMap::new();
        params.insert("foo_bar".to_string(), Literal::Int(42));
        params.insert("start_freq".to_string(), Literal::Float(77.0));
        let converted = convert_params(&params);
        assert_eq!(converted.len(), 1);
        assert_eq!(converted[0].field, FirmwareField::StartFreqConst);
    }

    #[test]
    fn non_numeric_values_are_skipped() {
        let mut params = BTreeMap::new();
        params.insert("start_freq".to_string(), Literal::Str("fast".into()));
        assert!(convert_params(&params).is_empty());
    }

    #[test]
    fn full_parameter_table() {
        let script = [
            "start_freq = 77.0",
            "slope = 15.0148",
            "idle_time = 5",
            "adc_start_time = 6",
            "ramp_end_time = 40",
            "adc_samples = 256",
            "sample_freq = 8000",
            "rx_gain = 48",
            "start_chirp_tx = 0",
            "end_chirp_tx = 11",
            "nchirp_loops = 16",
            "nframes_master = 0",
            "Inter_Frame_Interval = 100.0",
        ];
        let params = crate::lua::parse_assignments(script);
        let converted = convert_params(&params);
        assert_eq!(converted.len(), 13);
    }
}
