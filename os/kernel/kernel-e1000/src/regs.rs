//! # e1000 Register Map
//!
//! Byte offsets into the device's memory-mapped register window and typed
//! views of the control registers the driver programs.

use bitfield_struct::bitfield;
use kernel_info::net::MULTICAST_TABLE_ENTRIES;

/// A 32-bit device register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    /// Device Control.
    Ctrl,
    /// Device Status.
    Status,
    /// Interrupt Cause Read; writing a 1 clears the cause.
    Icr,
    /// Interrupt Mask Set/Read.
    Ims,
    /// Interrupt Mask Clear.
    Imc,
    /// Receive Control.
    Rctl,
    /// Transmit Control.
    Tctl,
    /// Transmit Inter-Packet Gap.
    Tipg,
    /// Receive Descriptor Base Address, low/high dword.
    Rdbal,
    Rdbah,
    /// Receive Descriptor ring Length in bytes.
    Rdlen,
    /// Receive Descriptor Head (advanced by the device).
    Rdh,
    /// Receive Descriptor Tail (advanced by the driver).
    Rdt,
    /// Receive Delay Timer.
    Rdtr,
    /// Receive Absolute Delay Timer.
    Radv,
    /// Transmit Descriptor Base Address, low/high dword.
    Tdbal,
    Tdbah,
    /// Transmit Descriptor ring Length in bytes.
    Tdlen,
    /// Transmit Descriptor Head (advanced by the device).
    Tdh,
    /// Transmit Descriptor Tail (advanced by the driver).
    Tdt,
    /// Multicast Table Array entry `0..128`.
    Mta(usize),
    /// Receive Address Low for filter slot `n`.
    Ral(usize),
    /// Receive Address High for filter slot `n`.
    Rah(usize),
}

/// Number of receive address filter slots.
pub const RECEIVE_ADDRESS_SLOTS: usize = 16;

impl Register {
    /// Byte offset from the start of the register window.
    #[must_use]
    pub const fn offset(self) -> usize {
        match self {
            Self::Ctrl => 0x0000,
            Self::Status => 0x0008,
            Self::Icr => 0x00C0,
            Self::Ims => 0x00D0,
            Self::Imc => 0x00D8,
            Self::Rctl => 0x0100,
            Self::Tctl => 0x0400,
            Self::Tipg => 0x0410,
            Self::Rdbal => 0x2800,
            Self::Rdbah => 0x2804,
            Self::Rdlen => 0x2808,
            Self::Rdh => 0x2810,
            Self::Rdt => 0x2818,
            Self::Rdtr => 0x2820,
            Self::Radv => 0x282C,
            Self::Tdbal => 0x3800,
            Self::Tdbah => 0x3804,
            Self::Tdlen => 0x3808,
            Self::Tdh => 0x3810,
            Self::Tdt => 0x3818,
            Self::Mta(i) => {
                assert!(i < MULTICAST_TABLE_ENTRIES, "MTA index out of range");
                0x5200 + 4 * i
            }
            Self::Ral(n) => {
                assert!(n < RECEIVE_ADDRESS_SLOTS, "RAL slot out of range");
                0x5400 + 8 * n
            }
            Self::Rah(n) => {
                assert!(n < RECEIVE_ADDRESS_SLOTS, "RAH slot out of range");
                0x5404 + 8 * n
            }
        }
    }
}

/// Device Control register (CTRL).
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct DeviceControl {
    /// Bit 0: Full Duplex.
    pub fd_full_duplex: bool,
    #[bits(2)]
    _reserved_1_2: u8,
    /// Bit 3: Link Reset.
    pub lrst_link_reset: bool,
    #[bits(1)]
    _reserved_4: u8,
    /// Bit 5: Auto-Speed Detection Enable.
    pub asde_auto_speed_detect: bool,
    /// Bit 6: Set Link Up.
    pub slu_set_link_up: bool,
    /// Bit 7: Invert Loss-of-Signal.
    pub ilos_invert_loss_of_signal: bool,
    /// Bits 8–9: Speed selection.
    #[bits(2)]
    pub speed: u8,
    #[bits(1)]
    _reserved_10: u8,
    /// Bit 11: Force Speed.
    pub frcspd_force_speed: bool,
    /// Bit 12: Force Duplex.
    pub frcdplx_force_duplex: bool,
    #[bits(5)]
    _reserved_13_17: u8,
    /// Bits 18–23: Software-definable pins and wake-up control.
    #[bits(6)]
    _sdp_18_23: u8,
    #[bits(2)]
    _reserved_24_25: u8,
    /// Bit 26: Device Reset. Self-clearing.
    pub rst_device_reset: bool,
    /// Bit 27: Receive Flow Control Enable.
    pub rfce_rx_flow_control: bool,
    /// Bit 28: Transmit Flow Control Enable.
    pub tfce_tx_flow_control: bool,
    #[bits(1)]
    _reserved_29: u8,
    /// Bit 30: VLAN Mode Enable.
    pub vme_vlan_mode: bool,
    /// Bit 31: PHY Reset.
    pub phy_rst_phy_reset: bool,
}

/// Transmit Control register (TCTL).
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct TransmitControl {
    #[bits(1)]
    _reserved_0: u8,
    /// Bit 1: Transmitter Enable.
    pub en_enable: bool,
    #[bits(1)]
    _reserved_2: u8,
    /// Bit 3: Pad Short Packets.
    pub psp_pad_short_packets: bool,
    /// Bits 4–11: Collision Threshold.
    #[bits(8)]
    pub ct_collision_threshold: u8,
    /// Bits 12–21: Collision Distance.
    #[bits(10)]
    pub cold_collision_distance: u16,
    /// Bit 22: Software XOFF Transmission.
    pub swxoff: bool,
    #[bits(1)]
    _reserved_23: u8,
    /// Bit 24: Re-transmit on Late Collision.
    pub rtlc: bool,
    /// Bit 25: No Re-transmit on Underrun.
    pub nrtu: bool,
    #[bits(6)]
    _reserved_26_31: u8,
}

/// Receive buffer size encodings for [`ReceiveControl::bsize`] with `BSEX = 0`.
pub mod buffer_size {
    pub const B2048: u8 = 0b00;
    pub const B1024: u8 = 0b01;
    pub const B512: u8 = 0b10;
    pub const B256: u8 = 0b11;
}

/// Receive Control register (RCTL).
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct ReceiveControl {
    #[bits(1)]
    _reserved_0: u8,
    /// Bit 1: Receiver Enable.
    pub en_enable: bool,
    /// Bit 2: Store Bad Packets.
    pub sbp_store_bad_packets: bool,
    /// Bit 3: Unicast Promiscuous Enable.
    pub upe_unicast_promiscuous: bool,
    /// Bit 4: Multicast Promiscuous Enable.
    pub mpe_multicast_promiscuous: bool,
    /// Bit 5: Long Packet Reception Enable.
    pub lpe_long_packets: bool,
    /// Bits 6–7: Loopback Mode.
    #[bits(2)]
    pub lbm_loopback_mode: u8,
    /// Bits 8–9: Receive Descriptor Minimum Threshold Size.
    #[bits(2)]
    pub rdmts: u8,
    #[bits(2)]
    _reserved_10_11: u8,
    /// Bits 12–13: Multicast Offset.
    #[bits(2)]
    pub mo_multicast_offset: u8,
    #[bits(1)]
    _reserved_14: u8,
    /// Bit 15: Broadcast Accept Mode.
    pub bam_broadcast_accept: bool,
    /// Bits 16–17: Receive Buffer Size, see [`buffer_size`].
    #[bits(2)]
    pub bsize: u8,
    /// Bit 18: VLAN Filter Enable.
    pub vfe_vlan_filter: bool,
    /// Bit 19: Canonical Form Indicator Enable.
    pub cfien: bool,
    /// Bit 20: Canonical Form Indicator value.
    pub cfi: bool,
    #[bits(1)]
    _reserved_21: u8,
    /// Bit 22: Discard Pause Frames.
    pub dpf_discard_pause_frames: bool,
    /// Bit 23: Pass MAC Control Frames.
    pub pmcf_pass_mac_control: bool,
    #[bits(1)]
    _reserved_24: u8,
    /// Bit 25: Buffer Size Extension (multiplies `bsize` by 16).
    pub bsex_size_extension: bool,
    /// Bit 26: Strip Ethernet CRC.
    pub secrc_strip_crc: bool,
    #[bits(5)]
    _reserved_27_31: u8,
}

/// Transmit Inter-Packet Gap register (TIPG).
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct TransmitIpg {
    /// Bits 0–9: IPG Transmit Time.
    #[bits(10)]
    pub ipgt: u16,
    /// Bits 10–19: IPG Receive Time 1.
    #[bits(10)]
    pub ipgr1: u16,
    /// Bits 20–29: IPG Receive Time 2.
    #[bits(10)]
    pub ipgr2: u16,
    #[bits(2)]
    _reserved_30_31: u8,
}

/// Interrupt causes, as found in ICR, IMS and IMC.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct InterruptCause {
    /// Bit 0: Transmit Descriptor Written Back.
    pub txdw: bool,
    /// Bit 1: Transmit Queue Empty.
    pub txqe: bool,
    /// Bit 2: Link Status Change.
    pub lsc: bool,
    /// Bit 3: Receive Sequence Error.
    pub rxseq: bool,
    /// Bit 4: Receive Descriptor Minimum Threshold hit.
    pub rxdmt0: bool,
    #[bits(1)]
    _reserved_5: u8,
    /// Bit 6: Receiver Overrun.
    pub rxo: bool,
    /// Bit 7: Receiver Timer Interrupt.
    pub rxt0: bool,
    #[bits(1)]
    _reserved_8: u8,
    /// Bit 9: MDI/O Access Complete.
    pub mdac: bool,
    /// Bit 10: Receiving /C/ ordered sets.
    pub rxcfg: bool,
    #[bits(1)]
    _reserved_11: u8,
    /// Bit 12: PHY Interrupt.
    pub phyint: bool,
    /// Bits 13–14: General Purpose Interrupts.
    #[bits(2)]
    pub gpi: u8,
    /// Bit 15: Transmit Descriptor Low Threshold hit.
    pub txd_low: bool,
    /// Bit 16: Small Receive Packet Detected.
    pub srpd: bool,
    #[bits(15)]
    _reserved_17_31: u16,
}
