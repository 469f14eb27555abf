//! Multi-device descriptor expansion and `.mmwave.json` serialization.
//!
//! The descriptor document is what mmWave Studio and the raw-data
//! post-processing scripts consume, so its key layout and formatting are
//! fixed: bit-field registers (channel enables, TX enables) are rendered as
//! uppercase `0x`-prefixed hex strings, the `miscCtl` mode code as a quoted
//! decimal string, every other numeric field as a native JSON number, and the
//! creation stamp as a timezone-aware RFC 3339 string. Register values are
//! converted back to physical units with the exact inverse formulas from
//! [`crate::convert`].

use crate::chirp::{tx_enable, NUM_CHIRPS, NUM_DEVICES};
use crate::config::DeviceConfig;
use crate::convert::{
    frame_period_lsb_to_ms, freq_lsb_to_ghz, slope_lsb_to_mhz_per_us, time_lsb_to_us, TIME_LSB_US,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{BufWriter, Write as _};
use std::path::Path;

/// The one formatting policy for bit-field registers: uppercase hex,
/// `0x` prefix, no zero padding.
fn hex(value: u32) -> String {
    format!("0x{value:X}")
}

// ---------------------------------------------------------------------------
// Document layout
// ---------------------------------------------------------------------------

/// Top-level `.mmwave.json` document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MmWaveDescriptor {
    #[serde(rename = "configGenerator")]
    pub config_generator: ConfigGenerator,
    #[serde(rename = "currentVersion")]
    pub current_version: CurrentVersion,
    #[serde(rename = "lastBackwardCompatibleVersion")]
    pub last_backward_compatible_version: BackwardCompatibleVersion,
    #[serde(rename = "regulatoryRestrictions")]
    pub regulatory_restrictions: RegulatoryRestrictions,
    #[serde(rename = "systemConfig")]
    pub system_config: SystemConfig,
    #[serde(rename = "mmWaveDevices")]
    pub mm_wave_devices: Vec<MmWaveDevice>,
    #[serde(rename = "processingChainConfig")]
    pub processing_chain_config: ProcessingChainConfig,
}

/// Generation metadata.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConfigGenerator {
    #[serde(rename = "createdBy")]
    pub created_by: String,
    /// RFC 3339 with UTC offset
    #[serde(rename = "createdOn")]
    pub created_on: String,
    #[serde(rename = "isConfigIntermediate")]
    pub is_config_intermediate: u8,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Version {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CurrentVersion {
    #[serde(rename = "jsonCfgVersion")]
    pub json_cfg_version: Version,
    #[serde(rename = "DFPVersion")]
    pub dfp_version: Version,
    #[serde(rename = "SDKVersion")]
    pub sdk_version: Version,
    #[serde(rename = "mmwavelinkVersion")]
    pub mmwavelink_version: Version,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BackwardCompatibleVersion {
    #[serde(rename = "DFPVersion")]
    pub dfp_version: Version,
    #[serde(rename = "SDKVersion")]
    pub sdk_version: Version,
    #[serde(rename = "mmwavelinkVersion")]
    pub mmwavelink_version: Version,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegulatoryRestrictions {
    #[serde(rename = "frequencyRangeBegin_GHz")]
    pub frequency_range_begin_ghz: u16,
    #[serde(rename = "frequencyRangeEnd_GHz")]
    pub frequency_range_end_ghz: u16,
    #[serde(rename = "maxBandwidthAllowed_MHz")]
    pub max_bandwidth_allowed_mhz: u16,
    #[serde(rename = "maxTransmitPowerAllowed_dBm")]
    pub max_transmit_power_allowed_dbm: u16,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SystemConfig {
    pub summary: String,
    #[serde(rename = "sceneParameters")]
    pub scene_parameters: SceneParameters,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SceneParameters {
    #[serde(rename = "ambientTemperature_degC")]
    pub ambient_temperature_degc: i16,
    #[serde(rename = "maxDetectableRange_m")]
    pub max_detectable_range_m: u16,
    #[serde(rename = "rangeResolution_cm")]
    pub range_resolution_cm: u16,
    #[serde(rename = "maxVelocity_kmph")]
    pub max_velocity_kmph: f64,
    #[serde(rename = "velocityResolution_kmph")]
    pub velocity_resolution_kmph: f64,
    #[serde(rename = "measurementRate")]
    pub measurement_rate: u16,
    #[serde(rename = "typicalDetectedObjectRCS")]
    pub typical_detected_object_rcs: f64,
}

/// One cascade chip.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MmWaveDevice {
    #[serde(rename = "mmWaveDeviceId")]
    pub mm_wave_device_id: usize,
    #[serde(rename = "rfConfig")]
    pub rf_config: RfConfig,
    #[serde(rename = "rawDataCaptureConfig")]
    pub raw_data_capture_config: RawDataCaptureConfig,
    #[serde(rename = "monitoringConfig")]
    pub monitoring_config: MonitoringConfig,
}

/// Reserved for monitoring profiles; emitted as an empty object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MonitoringConfig {}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RfConfig {
    #[serde(rename = "waveformType")]
    pub waveform_type: String,
    #[serde(rename = "MIMOScheme")]
    pub mimo_scheme: String,
    #[serde(rename = "rlCalibrationDataFile")]
    pub rl_calibration_data_file: String,
    #[serde(rename = "rlChanCfg_t")]
    pub chan_cfg: ChanCfgJson,
    #[serde(rename = "rlAdcOutCfg_t")]
    pub adc_out_cfg: AdcOutCfgJson,
    #[serde(rename = "rlLowPowerModeCfg_t")]
    pub low_power_mode_cfg: LowPowerModeCfgJson,
    #[serde(rename = "rlProfiles")]
    pub profiles: Vec<ProfileEntry>,
    #[serde(rename = "rlChirps")]
    pub chirps: Vec<ChirpEntry>,
    #[serde(rename = "rlRfInitCalConf_t")]
    pub rf_init_cal_conf: RfInitCalConfJson,
    #[serde(rename = "rlFrameCfg_t")]
    pub frame_cfg: FrameCfgJson,
    #[serde(rename = "rlBpmChirps")]
    pub bpm_chirps: Vec<Value>,
    #[serde(rename = "rlRfMiscConf_t")]
    pub rf_misc_conf: RfMiscConfJson,
    #[serde(rename = "rlRfPhaseShiftCfgs")]
    pub rf_phase_shift_cfgs: Vec<Value>,
    #[serde(rename = "rlRfProgFiltConfs")]
    pub rf_prog_filt_confs: Vec<Value>,
    #[serde(rename = "rlRfLdoBypassCfg_t")]
    pub rf_ldo_bypass_cfg: LdoBypassCfgJson,
    #[serde(rename = "rlLoopbackBursts")]
    pub loopback_bursts: Vec<Value>,
    #[serde(rename = "rlDynChirpCfgs")]
    pub dyn_chirp_cfgs: Vec<Value>,
    #[serde(rename = "rlDynPerChirpPhShftCfgs")]
    pub dyn_per_chirp_ph_shft_cfgs: Vec<Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChanCfgJson {
    #[serde(rename = "rxChannelEn")]
    pub rx_channel_en: String,
    #[serde(rename = "txChannelEn")]
    pub tx_channel_en: String,
    pub cascading: u8,
    #[serde(rename = "cascadingPinoutCfg")]
    pub cascading_pinout_cfg: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdcOutCfgJson {
    pub fmt: AdcOutFmtJson,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdcOutFmtJson {
    #[serde(rename = "b2AdcBits")]
    pub b2_adc_bits: u8,
    #[serde(rename = "b8FullScaleReducFctr")]
    pub b8_full_scale_reduc_fctr: u8,
    #[serde(rename = "b2AdcOutFmt")]
    pub b2_adc_out_fmt: u8,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LowPowerModeCfgJson {
    #[serde(rename = "lpAdcMode")]
    pub lp_adc_mode: u8,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProfileEntry {
    #[serde(rename = "rlProfileCfg_t")]
    pub profile_cfg: ProfileCfgJson,
}

/// Profile registers in physical units (inverse-converted).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProfileCfgJson {
    #[serde(rename = "profileId")]
    pub profile_id: u16,
    #[serde(rename = "pfVcoSelect")]
    pub pf_vco_select: String,
    #[serde(rename = "pfCalLutUpdate")]
    pub pf_cal_lut_update: String,
    #[serde(rename = "startFreqConst_GHz")]
    pub start_freq_const_ghz: f64,
    #[serde(rename = "idleTimeConst_usec")]
    pub idle_time_const_usec: f64,
    #[serde(rename = "adcStartTimeConst_usec")]
    pub adc_start_time_const_usec: f64,
    #[serde(rename = "rampEndTime_usec")]
    pub ramp_end_time_usec: f64,
    #[serde(rename = "txOutPowerBackoffCode")]
    pub tx_out_power_backoff_code: String,
    #[serde(rename = "txPhaseShifter")]
    pub tx_phase_shifter: String,
    #[serde(rename = "freqSlopeConst_MHz_usec")]
    pub freq_slope_const_mhz_usec: f64,
    #[serde(rename = "txStartTime_usec")]
    pub tx_start_time_usec: f64,
    #[serde(rename = "numAdcSamples")]
    pub num_adc_samples: u16,
    #[serde(rename = "digOutSampleRate")]
    pub dig_out_sample_rate: f64,
    #[serde(rename = "hpfCornerFreq1")]
    pub hpf_corner_freq1: u8,
    #[serde(rename = "hpfCornerFreq2")]
    pub hpf_corner_freq2: u8,
    #[serde(rename = "rxGain_dB")]
    pub rx_gain_db: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChirpEntry {
    #[serde(rename = "rlChirpCfg_t")]
    pub chirp_cfg: ChirpCfgJson,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChirpCfgJson {
    #[serde(rename = "chirpStartIdx")]
    pub chirp_start_idx: u8,
    #[serde(rename = "chirpEndIdx")]
    pub chirp_end_idx: u8,
    #[serde(rename = "profileId")]
    pub profile_id: u16,
    #[serde(rename = "startFreqVar_MHz")]
    pub start_freq_var_mhz: f64,
    #[serde(rename = "freqSlopeVar_KHz_usec")]
    pub freq_slope_var_khz_usec: f64,
    #[serde(rename = "idleTimeVar_usec")]
    pub idle_time_var_usec: f64,
    #[serde(rename = "adcStartTimeVar_usec")]
    pub adc_start_time_var_usec: f64,
    #[serde(rename = "txEnable")]
    pub tx_enable: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RfInitCalConfJson {
    #[serde(rename = "calibEnMask")]
    pub calib_en_mask: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FrameCfgJson {
    #[serde(rename = "chirpEndIdx")]
    pub chirp_end_idx: u16,
    #[serde(rename = "chirpStartIdx")]
    pub chirp_start_idx: u16,
    #[serde(rename = "numLoops")]
    pub num_loops: u16,
    #[serde(rename = "numFrames")]
    pub num_frames: u16,
    #[serde(rename = "framePeriodicity_msec")]
    pub frame_periodicity_msec: f64,
    #[serde(rename = "triggerSelect")]
    pub trigger_select: u8,
    #[serde(rename = "frameTriggerDelay")]
    pub frame_trigger_delay: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RfMiscConfJson {
    /// Mode code, consumed as a quoted decimal string.
    #[serde(rename = "miscCtl")]
    pub misc_ctl: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LdoBypassCfgJson {
    #[serde(rename = "ldoBypassEnable")]
    pub ldo_bypass_enable: u8,
    #[serde(rename = "supplyMonIrDrop")]
    pub supply_mon_ir_drop: u8,
    #[serde(rename = "ioSupplyIndicator")]
    pub io_supply_indicator: u8,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawDataCaptureConfig {
    #[serde(rename = "rlDevDataFmtCfg_t")]
    pub dev_data_fmt_cfg: DevDataFmtCfgJson,
    #[serde(rename = "rlDevDataPathCfg_t")]
    pub dev_data_path_cfg: DevDataPathCfgJson,
    #[serde(rename = "rlDevDataPathClkCfg_t")]
    pub dev_data_path_clk_cfg: DevDataPathClkCfgJson,
    #[serde(rename = "rlDevCsi2Cfg_t")]
    pub dev_csi2_cfg: DevCsi2CfgJson,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DevDataFmtCfgJson {
    #[serde(rename = "iqSwapSel")]
    pub iq_swap_sel: u8,
    #[serde(rename = "chInterleave")]
    pub ch_interleave: u8,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DevDataPathCfgJson {
    #[serde(rename = "intfSel")]
    pub intf_sel: u8,
    #[serde(rename = "transferFmtPkt0")]
    pub transfer_fmt_pkt0: String,
    #[serde(rename = "transferFmtPkt1")]
    pub transfer_fmt_pkt1: String,
    #[serde(rename = "cqConfig")]
    pub cq_config: u8,
    #[serde(rename = "cq0TransSize")]
    pub cq0_trans_size: u16,
    #[serde(rename = "cq1TransSize")]
    pub cq1_trans_size: u16,
    #[serde(rename = "cq2TransSize")]
    pub cq2_trans_size: u16,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DevDataPathClkCfgJson {
    #[serde(rename = "laneClkCfg")]
    pub lane_clk_cfg: u8,
    #[serde(rename = "dataRate_Mbps")]
    pub data_rate_mbps: u16,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DevCsi2CfgJson {
    #[serde(rename = "lanePosPolSel")]
    pub lane_pos_pol_sel: String,
    #[serde(rename = "lineStartEndDis")]
    pub line_start_end_dis: u8,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessingChainConfig {
    #[serde(rename = "detectionChain")]
    pub detection_chain: DetectionChain,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DetectionChain {
    pub name: String,
    #[serde(rename = "detectionLoss")]
    pub detection_loss: u16,
    #[serde(rename = "systemLoss")]
    pub system_loss: u16,
    #[serde(rename = "implementationMargin")]
    pub implementation_margin: u16,
    #[serde(rename = "detectionSNR")]
    pub detection_snr: u16,
    #[serde(rename = "theoreticalRxAntennaGain")]
    pub theoretical_rx_antenna_gain: u16,
    #[serde(rename = "theoreticalTxAntennaGain")]
    pub theoretical_tx_antenna_gain: u16,
}

// ---------------------------------------------------------------------------
// Expansion
// ---------------------------------------------------------------------------

/// Expand the shared configuration into a multi-device descriptor document.
///
/// Every chip shares the same profile and frame timing; only the cascading
/// role, the frame trigger source and the per-chirp TX-enable bitmap differ
/// per device. `num_devices` is normally [`NUM_DEVICES`]; partial arrays are
/// supported, anything beyond the wired cascade size is rejected.
pub fn expand_descriptor(
    config: &DeviceConfig,
    num_devices: usize,
    created_by: &str,
) -> Result<MmWaveDescriptor> {
    anyhow::ensure!(
        (1..=NUM_DEVICES).contains(&num_devices),
        "cascade supports 1 to {NUM_DEVICES} devices, got {num_devices}"
    );
    Ok(expand_at(
        config,
        num_devices,
        created_by,
        chrono::Local::now().to_rfc3339(),
    ))
}

fn expand_at(
    config: &DeviceConfig,
    num_devices: usize,
    created_by: &str,
    created_on: String,
) -> MmWaveDescriptor {
    let devices = (0..num_devices)
        .map(|dev_id| expand_device(config, dev_id))
        .collect();

    MmWaveDescriptor {
        config_generator: ConfigGenerator {
            created_by: created_by.to_string(),
            created_on,
            is_config_intermediate: 1,
        },
        current_version: CurrentVersion {
            json_cfg_version: version(0, 4, 0),
            dfp_version: version(2, 2, 0),
            sdk_version: version(3, 3, 0),
            mmwavelink_version: version(2, 2, 0),
        },
        last_backward_compatible_version: BackwardCompatibleVersion {
            dfp_version: version(2, 1, 0),
            sdk_version: version(3, 0, 0),
            mmwavelink_version: version(2, 1, 0),
        },
        regulatory_restrictions: RegulatoryRestrictions {
            frequency_range_begin_ghz: 76,
            frequency_range_end_ghz: 81,
            max_bandwidth_allowed_mhz: 4000,
            max_transmit_power_allowed_dbm: 12,
        },
        system_config: SystemConfig {
            summary: "Configuration exported from mmwcas".to_string(),
            scene_parameters: SceneParameters {
                ambient_temperature_degc: 25,
                max_detectable_range_m: 80,
                range_resolution_cm: 30,
                max_velocity_kmph: 6.49,
                velocity_resolution_kmph: 0.4,
                measurement_rate: 10,
                typical_detected_object_rcs: 1.0,
            },
        },
        mm_wave_devices: devices,
        processing_chain_config: ProcessingChainConfig {
            detection_chain: DetectionChain {
                name: "TI_GenericChain".to_string(),
                detection_loss: 1,
                system_loss: 1,
                implementation_margin: 2,
                detection_snr: 12,
                theoretical_rx_antenna_gain: 9,
                theoretical_tx_antenna_gain: 9,
            },
        },
    }
}

fn version(major: u16, minor: u16, patch: u16) -> Version {
    Version {
        major,
        minor,
        patch,
    }
}

fn expand_device(config: &DeviceConfig, dev_id: usize) -> MmWaveDevice {
    let p = &config.profile;
    let f = &config.frame;
    let primary = dev_id == 0;

    let chirps = (0..NUM_CHIRPS as u8)
        .map(|chirp_idx| ChirpEntry {
            chirp_cfg: ChirpCfgJson {
                chirp_start_idx: chirp_idx,
                chirp_end_idx: chirp_idx,
                profile_id: p.profile_id,
                start_freq_var_mhz: 0.0,
                freq_slope_var_khz_usec: 0.0,
                idle_time_var_usec: 0.0,
                adc_start_time_var_usec: 0.0,
                tx_enable: hex(tx_enable(dev_id, chirp_idx) as u32),
            },
        })
        .collect();

    MmWaveDevice {
        mm_wave_device_id: dev_id,
        rf_config: RfConfig {
            waveform_type: "legacyFrameChirp".to_string(),
            mimo_scheme: "TDM".to_string(),
            rl_calibration_data_file: String::new(),
            chan_cfg: ChanCfgJson {
                rx_channel_en: hex(config.channel.rx_channel_en as u32),
                tx_channel_en: hex(config.channel.tx_channel_en as u32),
                cascading: if primary { 1 } else { 2 },
                cascading_pinout_cfg: hex(0),
            },
            adc_out_cfg: AdcOutCfgJson {
                fmt: AdcOutFmtJson {
                    b2_adc_bits: config.adc_out.b2_adc_bits,
                    b8_full_scale_reduc_fctr: config.adc_out.b8_full_scale_reduc_fctr,
                    b2_adc_out_fmt: config.adc_out.b2_adc_out_fmt,
                },
            },
            low_power_mode_cfg: LowPowerModeCfgJson {
                lp_adc_mode: config.lpm.lp_adc_mode,
            },
            profiles: vec![ProfileEntry {
                profile_cfg: ProfileCfgJson {
                    profile_id: p.profile_id,
                    pf_vco_select: hex(p.pf_vco_select as u32),
                    pf_cal_lut_update: hex(0),
                    start_freq_const_ghz: freq_lsb_to_ghz(p.start_freq_const),
                    idle_time_const_usec: time_lsb_to_us(p.idle_time_const),
                    adc_start_time_const_usec: time_lsb_to_us(p.adc_start_time_const),
                    ramp_end_time_usec: time_lsb_to_us(p.ramp_end_time),
                    tx_out_power_backoff_code: hex(p.tx_out_power_backoff_code),
                    tx_phase_shifter: hex(p.tx_phase_shifter),
                    freq_slope_const_mhz_usec: slope_lsb_to_mhz_per_us(p.freq_slope_const),
                    tx_start_time_usec: p.tx_start_time as f64 * TIME_LSB_US,
                    num_adc_samples: p.num_adc_samples,
                    dig_out_sample_rate: p.dig_out_sample_rate as f64,
                    hpf_corner_freq1: p.hpf_corner_freq1,
                    hpf_corner_freq2: p.hpf_corner_freq2,
                    rx_gain_db: hex(p.rx_gain as u32),
                },
            }],
            chirps,
            rf_init_cal_conf: RfInitCalConfJson {
                calib_en_mask: hex(0x1FF0),
            },
            frame_cfg: FrameCfgJson {
                chirp_end_idx: f.chirp_end_idx,
                chirp_start_idx: f.chirp_start_idx,
                num_loops: f.num_loops,
                num_frames: f.num_frames,
                frame_periodicity_msec: frame_period_lsb_to_ms(f.frame_periodicity),
                // Software trigger on the primary chip, hardware sync on the
                // secondaries.
                trigger_select: if primary { 1 } else { 2 },
                frame_trigger_delay: f.frame_trigger_delay as f64 * TIME_LSB_US,
            },
            bpm_chirps: Vec::new(),
            rf_misc_conf: RfMiscConfJson {
                misc_ctl: config.misc.misc_ctl.to_string(),
            },
            rf_phase_shift_cfgs: Vec::new(),
            rf_prog_filt_confs: Vec::new(),
            rf_ldo_bypass_cfg: LdoBypassCfgJson {
                ldo_bypass_enable: config.ldo.ldo_bypass_enable,
                supply_mon_ir_drop: config.ldo.supply_mon_ir_drop,
                io_supply_indicator: config.ldo.io_supply_indicator,
            },
            loopback_bursts: Vec::new(),
            dyn_chirp_cfgs: Vec::new(),
            dyn_per_chirp_ph_shft_cfgs: Vec::new(),
        },
        raw_data_capture_config: RawDataCaptureConfig {
            dev_data_fmt_cfg: DevDataFmtCfgJson {
                iq_swap_sel: config.data_fmt.iq_swap_sel,
                ch_interleave: config.data_fmt.ch_interleave,
            },
            dev_data_path_cfg: DevDataPathCfgJson {
                intf_sel: config.data_path.intf_sel,
                transfer_fmt_pkt0: hex(config.data_path.transfer_fmt_pkt0 as u32),
                transfer_fmt_pkt1: hex(config.data_path.transfer_fmt_pkt1 as u32),
                cq_config: 0,
                cq0_trans_size: 0,
                cq1_trans_size: 0,
                cq2_trans_size: 0,
            },
            dev_data_path_clk_cfg: DevDataPathClkCfgJson {
                lane_clk_cfg: config.data_path_clk.lane_clk_cfg,
                data_rate_mbps: if config.data_path_clk.data_rate == 1 {
                    600
                } else {
                    450
                },
            },
            dev_csi2_cfg: DevCsi2CfgJson {
                lane_pos_pol_sel: hex(config.csi2.lane_pos_pol_sel),
                line_start_end_dis: config.csi2.line_start_end_dis,
            },
        },
        monitoring_config: MonitoringConfig {},
    }
}

// ---------------------------------------------------------------------------
// Setup metadata
// ---------------------------------------------------------------------------

/// Companion `.setup.json` metadata written next to a generated descriptor:
/// where the capture lands, which board produced it and which configuration
/// file it came from.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CaptureSetup {
    pub capture_directory: String,
    pub board_ip: String,
    pub firmware_image: String,
    pub config_file: String,
    pub generated_at: String,
    pub unix_timestamp: i64,
    pub note: String,
}

impl CaptureSetup {
    pub fn new(capture_directory: &str, board_ip: &str, config_file: &str) -> Self {
        let now = chrono::Local::now();
        Self {
            capture_directory: capture_directory.to_string(),
            board_ip: board_ip.to_string(),
            firmware_image: "xwr22xx_metaImage.bin".to_string(),
            config_file: config_file.to_string(),
            generated_at: now.to_rfc3339(),
            unix_timestamp: now.timestamp(),
            note: "mmWave Studio compatible metadata".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

/// Write the descriptor document as pretty-printed JSON.
///
/// The document is written to a temporary file in the destination directory
/// and atomically renamed into place, so a failed write never corrupts an
/// existing descriptor at the same path.
pub fn write_descriptor(descriptor: &MmWaveDescriptor, path: &Path) -> Result<()> {
    write_json_atomic(descriptor, path)
}

/// Write the setup metadata next to its descriptor, same atomic policy.
pub fn write_setup(setup: &CaptureSetup, path: &Path) -> Result<()> {
    write_json_atomic(setup, path)
}

fn write_json_atomic<T: Serialize>(document: &T, path: &Path) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp);

    let file = std::fs::File::create(&tmp)
        .with_context(|| format!("creating descriptor file {}", tmp.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, document)
        .with_context(|| format!("serializing descriptor to {}", tmp.display()))?;
    writer
        .flush()
        .with_context(|| format!("flushing descriptor to {}", tmp.display()))?;

    std::fs::rename(&tmp, path)
        .with_context(|| format!("replacing descriptor at {}", path.display()))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::convert_params;
    use crate::lua::parse_assignments;

    fn configured() -> DeviceConfig {
        let params = parse_assignments([
            "start_freq = 79.0",
            "slope = 65.854",
            "idle_time = 3",
            "adc_start_time = 3",
            "ramp_end_time = 28",
            "adc_samples = 512",
            "sample_freq = 22500",
            "rx_gain = 48",
            "Inter_Frame_Interval = 50.0",
        ]);
        let mut cfg = DeviceConfig::default();
        cfg.apply(&convert_params(&params));
        cfg
    }

    #[test]
    fn four_devices_twelve_chirps() {
        let doc = expand_descriptor(&configured(), NUM_DEVICES, "test").unwrap();
        assert_eq!(doc.mm_wave_devices.len(), 4);
        for dev in &doc.mm_wave_devices {
            assert_eq!(dev.rf_config.chirps.len(), 12);
            assert_eq!(dev.rf_config.profiles.len(), 1);
        }
    }

    #[test]
    fn partial_array() {
        let doc = expand_descriptor(&configured(), 2, "test").unwrap();
        assert_eq!(doc.mm_wave_devices.len(), 2);
    }

    #[test]
    fn device_count_beyond_cascade_is_rejected() {
        let err = expand_descriptor(&configured(), NUM_DEVICES + 1, "test").unwrap_err();
        assert!(err.to_string().contains("got 5"), "unexpected error: {err}");
        // an empty cascade makes no descriptor either
        assert!(expand_descriptor(&configured(), 0, "test").is_err());
    }

    #[test]
    fn roles_vary_per_device_only() {
        let doc = expand_descriptor(&configured(), 4, "test").unwrap();
        for dev in &doc.mm_wave_devices {
            let primary = dev.mm_wave_device_id == 0;
            assert_eq!(dev.rf_config.chan_cfg.cascading, if primary { 1 } else { 2 });
            assert_eq!(
                dev.rf_config.frame_cfg.trigger_select,
                if primary { 1 } else { 2 }
            );
        }
        // profile timing is shared
        let freqs: Vec<f64> = doc
            .mm_wave_devices
            .iter()
            .map(|d| d.rf_config.profiles[0].profile_cfg.start_freq_const_ghz)
            .collect();
        assert!(freqs.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn inverse_conversion_recovers_physical_values() {
        let doc = expand_descriptor(&configured(), 4, "test").unwrap();
        let profile = &doc.mm_wave_devices[0].rf_config.profiles[0].profile_cfg;
        assert!((profile.start_freq_const_ghz - 79.0).abs() < 1e-6);
        assert!((profile.idle_time_const_usec - 3.0).abs() < 1e-9);
        assert!((profile.ramp_end_time_usec - 28.0).abs() < 1e-9);
        assert!((profile.freq_slope_const_mhz_usec - 65.854).abs() < 0.05);
        let frame = &doc.mm_wave_devices[0].rf_config.frame_cfg;
        assert!((frame.frame_periodicity_msec - 50.0).abs() < 1e-9);
    }

    #[test]
    fn bit_fields_render_as_uppercase_hex_strings() {
        let doc = expand_descriptor(&configured(), 4, "test").unwrap();
        let dev = &doc.mm_wave_devices[0];
        assert_eq!(dev.rf_config.chan_cfg.rx_channel_en, "0xF");
        assert_eq!(dev.rf_config.chan_cfg.tx_channel_en, "0x7");
        assert_eq!(dev.rf_config.profiles[0].profile_cfg.rx_gain_db, "0x30");
        assert_eq!(dev.rf_config.rf_init_cal_conf.calib_en_mask, "0x1FF0");
        // miscCtl is a mode code, quoted decimal rather than hex
        assert_eq!(dev.rf_config.rf_misc_conf.misc_ctl, "1");

        // numeric fields stay native JSON numbers
        let json = serde_json::to_value(&doc).unwrap();
        let profile = &json["mmWaveDevices"][0]["rfConfig"]["rlProfiles"][0]["rlProfileCfg_t"];
        assert!(profile["startFreqConst_GHz"].is_f64());
        assert!(profile["numAdcSamples"].is_number());
        assert!(profile["rxGain_dB"].is_string());
        assert!(json["mmWaveDevices"][0]["rfConfig"]["rlRfMiscConf_t"]["miscCtl"].is_string());
    }

    #[test]
    fn chirp_tx_enable_matches_assignment_table() {
        let doc = expand_descriptor(&configured(), 4, "test").unwrap();
        // device 0 drives chirps 9..=11, everything else is silent
        let chirps = &doc.mm_wave_devices[0].rf_config.chirps;
        assert_eq!(chirps[11].chirp_cfg.tx_enable, "0x1");
        assert_eq!(chirps[10].chirp_cfg.tx_enable, "0x2");
        assert_eq!(chirps[9].chirp_cfg.tx_enable, "0x4");
        for idx in 0..9 {
            assert_eq!(chirps[idx].chirp_cfg.tx_enable, "0x0");
        }
        // device 3 drives chirps 0..=2
        let chirps = &doc.mm_wave_devices[3].rf_config.chirps;
        assert_eq!(chirps[0].chirp_cfg.tx_enable, "0x4");
        assert_eq!(chirps[2].chirp_cfg.tx_enable, "0x1");
    }

    #[test]
    fn document_key_layout() {
        let doc = expand_descriptor(&configured(), 1, "mmwcas-test").unwrap();
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["configGenerator"]["createdBy"], "mmwcas-test");
        assert_eq!(json["configGenerator"]["isConfigIntermediate"], 1);
        assert!(json["configGenerator"]["createdOn"].is_string());
        assert!(json["mmWaveDevices"].is_array());
        let dev = &json["mmWaveDevices"][0];
        assert!(dev["rfConfig"]["rlChanCfg_t"]["rxChannelEn"].is_string());
        assert!(dev["rawDataCaptureConfig"]["rlDevDataFmtCfg_t"]["iqSwapSel"].is_number());
        assert!(dev["rawDataCaptureConfig"]["rlDevDataPathCfg_t"]["transferFmtPkt0"].is_string());
        assert!(dev["monitoringConfig"].is_object());
    }

    #[test]
    fn write_replaces_existing_file_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.mmwave.json");

        let first = expand_descriptor(&configured(), 4, "first").unwrap();
        write_descriptor(&first, &path).unwrap();
        let second = expand_descriptor(&configured(), 2, "second").unwrap();
        write_descriptor(&second, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["configGenerator"]["createdBy"], "second");
        assert_eq!(json["mmWaveDevices"].as_array().unwrap().len(), 2);
        // no temp file left behind
        assert!(!dir.path().join("capture.mmwave.json.tmp").exists());
    }

    #[test]
    fn write_to_invalid_path_reports_destination() {
        let doc = expand_descriptor(&configured(), 1, "test").unwrap();
        let err = write_descriptor(&doc, Path::new("/nonexistent-dir/out.json")).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent-dir/out.json"));
    }

    #[test]
    fn setup_metadata_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outdoor1.setup.json");
        let setup = CaptureSetup::new("outdoor1", "192.168.33.180", "outdoor1.toml");
        write_setup(&setup, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["capture_directory"], "outdoor1");
        assert_eq!(json["board_ip"], "192.168.33.180");
        assert_eq!(json["config_file"], "outdoor1.toml");
        assert_eq!(json["firmware_image"], "xwr22xx_metaImage.bin");
        assert!(json["generated_at"].is_string());
        assert!(json["unix_timestamp"].is_i64());
        assert!(!dir.path().join("outdoor1.setup.json.tmp").exists());
    }

    #[test]
    fn timestamp_carries_utc_offset() {
        let doc = expand_descriptor(&configured(), 1, "test").unwrap();
        let ts = &doc.config_generator.created_on;
        // RFC 3339 offset suffix: Z or ±HH:MM
        assert!(
            ts.ends_with('Z') || ts.as_bytes()[ts.len() - 6] == b'+' || ts.as_bytes()[ts.len() - 6] == b'-',
            "timestamp missing offset: {ts}"
        );
    }
}
