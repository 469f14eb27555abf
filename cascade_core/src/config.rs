//! Canonical device configuration: defaults, overlay merge, and the TOML
//! configuration source.
//!
//! Every register block carried by the MMWCAS-RF-EVM (AWR2243, revision E)
//! has a complete default here. A configuration run starts from a fresh
//! default value — [`DeviceConfig::default`] is a pure factory, never a
//! shared global — and optionally overlays converted physical parameters on
//! top. Only the profile and frame blocks are subject to conversion; the
//! channel block and the fixed subsystem blocks (ADC output, data format,
//! LDO, low-power mode, data path, clocking, CSI2 lanes) are hardware facts.

use crate::convert::{
    self, ConvertedParam, FirmwareField,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// Register blocks
// ---------------------------------------------------------------------------

/// Chirp profile timing and frequency registers (LSB units).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProfileCfg {
    pub profile_id: u16,
    pub pf_vco_select: u8,
    /// 1 LSB = 53.6441803 Hz
    pub start_freq_const: u32,
    /// 1 LSB = 48.2797623 kHz/µs
    pub freq_slope_const: i16,
    /// 1 LSB = 10 ns
    pub idle_time_const: u32,
    /// 1 LSB = 10 ns
    pub adc_start_time_const: u32,
    /// 1 LSB = 10 ns
    pub ramp_end_time: u32,
    pub tx_out_power_backoff_code: u32,
    pub tx_phase_shifter: u32,
    /// 1 LSB = 10 ns
    pub tx_start_time: i32,
    pub num_adc_samples: u16,
    /// 1 LSB = 1 ksps
    pub dig_out_sample_rate: u16,
    pub hpf_corner_freq1: u8,
    pub hpf_corner_freq2: u8,
    /// 1 LSB = 1 dB
    pub rx_gain: u16,
}

impl Default for ProfileCfg {
    fn default() -> Self {
        Self {
            profile_id: 0,
            pf_vco_select: 0x02,
            start_freq_const: 1_434_000_000, // 77 GHz
            freq_slope_const: 518,           // 25.01 MHz/µs
            idle_time_const: 700,            // 7 µs
            adc_start_time_const: 435,       // 4.35 µs
            ramp_end_time: 6897,             // 68.97 µs
            tx_out_power_backoff_code: 0x0,
            tx_phase_shifter: 0x0,
            tx_start_time: 0x0,
            num_adc_samples: 512,
            dig_out_sample_rate: 8000, // 8 MHz
            hpf_corner_freq1: 0x0,     // 175 kHz
            hpf_corner_freq2: 0x0,     // 350 kHz
            rx_gain: 48,
        }
    }
}

/// Frame sequencing registers (LSB units).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameCfg {
    pub chirp_start_idx: u16,
    pub chirp_end_idx: u16,
    /// 0 = capture until stopped
    pub num_frames: u16,
    pub num_loops: u16,
    /// Complex samples per chirp (I and Q)
    pub num_adc_samples: u16,
    pub frame_trigger_delay: u32,
    /// 1 LSB = 5 ns
    pub frame_periodicity: u32,
}

impl Default for FrameCfg {
    fn default() -> Self {
        Self {
            chirp_start_idx: 0,
            chirp_end_idx: 11,
            num_frames: 0,
            num_loops: 10,
            num_adc_samples: 2 * 256,
            frame_trigger_delay: 0x0,
            frame_periodicity: 20_000_000, // 100 ms
        }
    }
}

/// RX/TX channel enables and the cascading role.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelCfg {
    pub rx_channel_en: u16,
    pub tx_channel_en: u16,
    /// 1 = primary chip, 2 = secondary
    pub cascading: u8,
}

impl Default for ChannelCfg {
    fn default() -> Self {
        Self {
            rx_channel_en: 0x0F, // all 4 RX channels
            tx_channel_en: 0x07, // all 3 TX channels
            cascading: 0x02,
        }
    }
}

/// ADC output format.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdcOutCfg {
    pub b2_adc_bits: u8,
    pub b2_adc_out_fmt: u8,
    pub b8_full_scale_reduc_fctr: u8,
}

impl Default for AdcOutCfg {
    fn default() -> Self {
        Self {
            b2_adc_bits: 2,     // 16-bit ADC
            b2_adc_out_fmt: 1,  // complex
            b8_full_scale_reduc_fctr: 0,
        }
    }
}

/// Device data format (kept consistent with [`AdcOutCfg`] and
/// [`ChannelCfg`], the single sources of truth for ADC format and RX
/// enables).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataFmtCfg {
    pub iq_swap_sel: u8,
    pub ch_interleave: u8,
    pub rx_channel_en: u16,
    pub adc_fmt: u8,
    pub adc_bits: u8,
}

impl Default for DataFmtCfg {
    fn default() -> Self {
        Self {
            iq_swap_sel: 0,    // I first
            ch_interleave: 0,  // interleaved
            rx_channel_en: 0xF,
            adc_fmt: 1,
            adc_bits: 2,
        }
    }
}

/// LDO bypass settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LdoCfg {
    pub ldo_bypass_enable: u8,
    pub io_supply_indicator: u8,
    pub supply_mon_ir_drop: u8,
}

impl Default for LdoCfg {
    fn default() -> Self {
        Self {
            ldo_bypass_enable: 3, // RF LDO and PA LDO disabled
            io_supply_indicator: 0,
            supply_mon_ir_drop: 0,
        }
    }
}

/// Low power mode.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LowPowerModeCfg {
    pub lp_adc_mode: u8,
}

/// Miscellaneous RF control.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MiscCfg {
    pub misc_ctl: u8,
}

impl Default for MiscCfg {
    fn default() -> Self {
        Self { misc_ctl: 1 } // per-chirp phase shifter enabled
    }
}

/// Data path interface selection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataPathCfg {
    pub intf_sel: u8,
    pub transfer_fmt_pkt0: u8,
    pub transfer_fmt_pkt1: u8,
}

impl Default for DataPathCfg {
    fn default() -> Self {
        Self {
            intf_sel: 0,          // CSI2
            transfer_fmt_pkt0: 1, // ADC data only
            transfer_fmt_pkt1: 0, // packet 1 suppressed
        }
    }
}

/// Data path lane clock.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataPathClkCfg {
    pub lane_clk_cfg: u8,
    pub data_rate: u8,
}

impl Default for DataPathClkCfg {
    fn default() -> Self {
        Self {
            lane_clk_cfg: 1, // DDR clock
            data_rate: 1,    // 600 Mbps
        }
    }
}

/// High speed interface clock.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HsiClkCfg {
    pub hsi_clk: u8,
}

impl Default for HsiClkCfg {
    fn default() -> Self {
        Self { hsi_clk: 0x09 } // DDR 600 Mbps
    }
}

/// CSI2 lane position/polarity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Csi2Cfg {
    pub line_start_end_dis: u8,
    pub lane_pos_pol_sel: u32,
}

impl Default for Csi2Cfg {
    fn default() -> Self {
        Self {
            line_start_end_dis: 0,
            lane_pos_pol_sel: 0x35421,
        }
    }
}

// ---------------------------------------------------------------------------
// Canonical configuration
// ---------------------------------------------------------------------------

/// The complete logical configuration shared by every chip in the cascade.
///
/// Constructed once per run from defaults, optionally overlaid with converted
/// values via [`DeviceConfig::apply`], then held immutable through descriptor
/// expansion and hardware programming.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub profile: ProfileCfg,
    pub frame: FrameCfg,
    pub channel: ChannelCfg,
    pub adc_out: AdcOutCfg,
    pub data_fmt: DataFmtCfg,
    pub ldo: LdoCfg,
    pub lpm: LowPowerModeCfg,
    pub misc: MiscCfg,
    pub data_path: DataPathCfg,
    pub data_path_clk: DataPathClkCfg,
    pub hsi_clk: HsiClkCfg,
    pub csi2: Csi2Cfg,
}

impl DeviceConfig {
    /// Overlay converted register values onto the profile and frame blocks.
    ///
    /// Channel and subsystem blocks are never touched here; unknown source
    /// parameters were already dropped at the conversion boundary, so every
    /// incoming field has exactly one home. Applying the same set twice is a
    /// no-op the second time.
    pub fn apply(&mut self, params: &[ConvertedParam]) {
        for p in params {
            match p.field {
                FirmwareField::StartFreqConst => self.profile.start_freq_const = p.value as u32,
                FirmwareField::FreqSlopeConst => self.profile.freq_slope_const = p.value as i16,
                FirmwareField::IdleTimeConst => self.profile.idle_time_const = p.value as u32,
                FirmwareField::AdcStartTimeConst => {
                    self.profile.adc_start_time_const = p.value as u32
                }
                FirmwareField::RampEndTime => self.profile.ramp_end_time = p.value as u32,
                FirmwareField::NumAdcSamples => self.profile.num_adc_samples = p.value as u16,
                FirmwareField::DigOutSampleRate => {
                    self.profile.dig_out_sample_rate = p.value as u16
                }
                FirmwareField::RxGain => self.profile.rx_gain = p.value as u16,
                FirmwareField::ChirpStartIdx => self.frame.chirp_start_idx = p.value as u16,
                FirmwareField::ChirpEndIdx => self.frame.chirp_end_idx = p.value as u16,
                FirmwareField::NumLoops => self.frame.num_loops = p.value as u16,
                FirmwareField::NumFrames => self.frame.num_frames = p.value as u16,
                FirmwareField::FramePeriodicity => {
                    self.frame.frame_periodicity = p.value as u32
                }
            }
        }
    }

    /// Build a configuration from the structured TOML source (physical
    /// units), running the forward conversions over a fresh default.
    pub fn from_mimo(mimo: &MimoConfig) -> Self {
        let mut cfg = Self::default();
        let p = &mimo.profile;
        cfg.profile.profile_id = p.id;
        cfg.profile.start_freq_const = convert::ghz_to_freq_lsb(p.start_frequency) as u32;
        cfg.profile.freq_slope_const = convert::mhz_per_us_to_slope_lsb(p.frequency_slope) as i16;
        cfg.profile.idle_time_const = convert::us_to_time_lsb(p.idle_time) as u32;
        cfg.profile.adc_start_time_const = convert::us_to_time_lsb(p.adc_start_time) as u32;
        cfg.profile.ramp_end_time = convert::us_to_time_lsb(p.ramp_end_time) as u32;
        cfg.profile.num_adc_samples = p.adc_samples;
        cfg.profile.dig_out_sample_rate = p.adc_sampling_frequency;
        cfg.profile.rx_gain = p.rx_gain;
        cfg.frame.num_frames = mimo.frame.num_frames;
        cfg.frame.num_loops = mimo.frame.num_loops;
        cfg.frame.frame_periodicity =
            convert::ms_to_frame_period_lsb(mimo.frame.frame_periodicity) as u32;
        cfg.channel.rx_channel_en = mimo.channel.rx_channel_en;
        cfg.channel.tx_channel_en = mimo.channel.tx_channel_en;
        // channel block is the single source of truth for RX enables
        cfg.data_fmt.rx_channel_en = mimo.channel.rx_channel_en;
        cfg
    }
}

// ---------------------------------------------------------------------------
// Structured TOML configuration source
// ---------------------------------------------------------------------------

/// `[mimo]` table of the TOML configuration file. All values are in physical
/// units; missing keys fall back to the documented defaults.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MimoConfig {
    #[serde(default)]
    pub profile: MimoProfile,
    #[serde(default)]
    pub frame: MimoFrame,
    #[serde(default)]
    pub channel: MimoChannel,
}

/// `[mimo.profile]` — chirp profile in physical units.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MimoProfile {
    #[serde(default)]
    pub id: u16,
    /// GHz
    #[serde(default = "default_start_frequency")]
    pub start_frequency: f64,
    /// MHz/µs
    #[serde(default = "default_frequency_slope")]
    pub frequency_slope: f64,
    /// µs
    #[serde(default = "default_idle_time")]
    pub idle_time: f64,
    /// µs
    #[serde(default = "default_adc_start_time")]
    pub adc_start_time: f64,
    /// µs
    #[serde(default = "default_ramp_end_time")]
    pub ramp_end_time: f64,
    #[serde(default = "default_adc_samples", alias = "numAdcSamples")]
    pub adc_samples: u16,
    /// ksps
    #[serde(default = "default_adc_sampling_frequency")]
    pub adc_sampling_frequency: u16,
    /// dB
    #[serde(default = "default_rx_gain")]
    pub rx_gain: u16,
}

fn default_start_frequency() -> f64 {
    79.0
}
fn default_frequency_slope() -> f64 {
    65.854
}
fn default_idle_time() -> f64 {
    3.0
}
fn default_adc_start_time() -> f64 {
    3.0
}
fn default_ramp_end_time() -> f64 {
    28.0
}
fn default_adc_samples() -> u16 {
    512
}
fn default_adc_sampling_frequency() -> u16 {
    22500
}
fn default_rx_gain() -> u16 {
    48
}

impl Default for MimoProfile {
    fn default() -> Self {
        Self {
            id: 0,
            start_frequency: default_start_frequency(),
            frequency_slope: default_frequency_slope(),
            idle_time: default_idle_time(),
            adc_start_time: default_adc_start_time(),
            ramp_end_time: default_ramp_end_time(),
            adc_samples: default_adc_samples(),
            adc_sampling_frequency: default_adc_sampling_frequency(),
            rx_gain: default_rx_gain(),
        }
    }
}

/// `[mimo.frame]` — frame sequencing in physical units.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MimoFrame {
    /// 0 = capture until stopped
    #[serde(default)]
    pub num_frames: u16,
    #[serde(default = "default_num_loops")]
    pub num_loops: u16,
    /// ms
    #[serde(default = "default_frame_periodicity")]
    pub frame_periodicity: f64,
}

fn default_num_loops() -> u16 {
    10
}
fn default_frame_periodicity() -> f64 {
    50.0
}

impl Default for MimoFrame {
    fn default() -> Self {
        Self {
            num_frames: 0,
            num_loops: default_num_loops(),
            frame_periodicity: default_frame_periodicity(),
        }
    }
}

/// `[mimo.channel]` — channel enable bitmasks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MimoChannel {
    #[serde(default = "default_rx_channel_en")]
    pub rx_channel_en: u16,
    #[serde(default = "default_tx_channel_en")]
    pub tx_channel_en: u16,
}

fn default_rx_channel_en() -> u16 {
    0x0F
}
fn default_tx_channel_en() -> u16 {
    0x07
}

impl Default for MimoChannel {
    fn default() -> Self {
        Self {
            rx_channel_en: default_rx_channel_en(),
            tx_channel_en: default_tx_channel_en(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    mimo: MimoConfig,
}

/// Load the `[mimo]` configuration from a TOML file.
pub fn load_mimo_toml(path: &Path) -> Result<MimoConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading configuration file {}", path.display()))?;
    let file: ConfigFile = toml::from_str(&text)
        .with_context(|| format!("parsing configuration file {}", path.display()))?;
    Ok(file.mimo)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
