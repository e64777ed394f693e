//! Measurement description block.
//!
//! The block starts with the fixed [`MeasureInfo`] record. Later software
//! revisions append further records; only the stop record is decoded here,
//! anything after it is ignored.

use crate::stream::{padded_record, read_text, write_text};
use crate::Result;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use flimsdt_core::MetadataTable;
use std::io::{self, Cursor, Read, Write};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Bytes of the [`MeasureInfo`] record.
pub const MEASURE_INFO_SIZE: usize = 211;

/// Bytes of the [`MeasStopInfo`] record.
pub const MEAS_STOP_INFO_SIZE: usize = 60;

/// Measurement mode of FIFO acquisitions, stored as a chain of blocks
/// holding complete planes.
pub const FIFO_MEASUREMENT_MODE: i16 = 13;

/// Acquisition settings of one measurement.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MeasureInfo {
    pub time: String,
    pub date: String,
    pub mod_ser_no: String,
    pub meas_mode: i16,
    pub cfd_ll: f32,
    pub cfd_lh: f32,
    pub cfd_zc: f32,
    pub cfd_hf: f32,
    pub syn_zc: f32,
    pub syn_fd: i16,
    pub syn_hf: f32,
    /// TAC range in seconds.
    pub tac_r: f32,
    pub tac_g: i16,
    pub tac_of: f32,
    pub tac_ll: f32,
    pub tac_lh: f32,
    /// ADC resolution, the number of histogram bins.
    pub adc_re: i16,
    pub eal_de: i16,
    pub ncx: i16,
    pub ncy: i16,
    pub page: i16,
    pub col_t: f32,
    pub rep_t: f32,
    pub stopt: i16,
    pub overfl: u8,
    pub use_motor: i16,
    pub steps: i16,
    pub offset: f32,
    pub dither: i16,
    pub incr: i16,
    pub mem_bank: i16,
    pub mod_type: String,
    pub syn_th: f32,
    pub dead_time_comp: i16,
    pub polarity_l: i16,
    pub polarity_f: i16,
    pub polarity_p: i16,
    pub linediv: i16,
    pub accumulate: i16,
    pub flbck_y: i32,
    pub flbck_x: i32,
    pub bord_u: i32,
    pub bord_l: i32,
    pub pix_time: f32,
    pub pix_clk: i16,
    pub trigger: i16,
    /// Pixels per line.
    pub scan_x: i32,
    /// Lines per frame.
    pub scan_y: i32,
    /// Routing channels in X (spectral channels).
    pub scan_rx: i32,
    pub scan_ry: i32,
    pub fifo_typ: i16,
    pub epx_div: i32,
    pub mod_type_code: i16,
    pub mod_fpga_ver: i16,
    pub overflow_corr_factor: f32,
    pub adc_zoom: i32,
    pub cycles: i32,
}

impl MeasureInfo {
    /// Reads the record from the current position of `reader`.
    ///
    /// # Errors
    /// Returns an I/O error if the stream ends inside the record.
    pub fn read<R: Read>(reader: &mut R) -> io::Result<Self> {
        Ok(Self {
            time: read_text(reader, 9)?,
            date: read_text(reader, 11)?,
            mod_ser_no: read_text(reader, 16)?,
            meas_mode: reader.read_i16::<LittleEndian>()?,
            cfd_ll: reader.read_f32::<LittleEndian>()?,
            cfd_lh: reader.read_f32::<LittleEndian>()?,
            cfd_zc: reader.read_f32::<LittleEndian>()?,
            cfd_hf: reader.read_f32::<LittleEndian>()?,
            syn_zc: reader.read_f32::<LittleEndian>()?,
            syn_fd: reader.read_i16::<LittleEndian>()?,
            syn_hf: reader.read_f32::<LittleEndian>()?,
            tac_r: reader.read_f32::<LittleEndian>()?,
            tac_g: reader.read_i16::<LittleEndian>()?,
            tac_of: reader.read_f32::<LittleEndian>()?,
            tac_ll: reader.read_f32::<LittleEndian>()?,
            tac_lh: reader.read_f32::<LittleEndian>()?,
            adc_re: reader.read_i16::<LittleEndian>()?,
            eal_de: reader.read_i16::<LittleEndian>()?,
            ncx: reader.read_i16::<LittleEndian>()?,
            ncy: reader.read_i16::<LittleEndian>()?,
            page: reader.read_i16::<LittleEndian>()?,
            col_t: reader.read_f32::<LittleEndian>()?,
            rep_t: reader.read_f32::<LittleEndian>()?,
            stopt: reader.read_i16::<LittleEndian>()?,
            overfl: reader.read_u8()?,
            use_motor: reader.read_i16::<LittleEndian>()?,
            steps: reader.read_i16::<LittleEndian>()?,
            offset: reader.read_f32::<LittleEndian>()?,
            dither: reader.read_i16::<LittleEndian>()?,
            incr: reader.read_i16::<LittleEndian>()?,
            mem_bank: reader.read_i16::<LittleEndian>()?,
            mod_type: read_text(reader, 16)?,
            syn_th: reader.read_f32::<LittleEndian>()?,
            dead_time_comp: reader.read_i16::<LittleEndian>()?,
            polarity_l: reader.read_i16::<LittleEndian>()?,
            polarity_f: reader.read_i16::<LittleEndian>()?,
            polarity_p: reader.read_i16::<LittleEndian>()?,
            linediv: reader.read_i16::<LittleEndian>()?,
            accumulate: reader.read_i16::<LittleEndian>()?,
            flbck_y: reader.read_i32::<LittleEndian>()?,
            flbck_x: reader.read_i32::<LittleEndian>()?,
            bord_u: reader.read_i32::<LittleEndian>()?,
            bord_l: reader.read_i32::<LittleEndian>()?,
            pix_time: reader.read_f32::<LittleEndian>()?,
            pix_clk: reader.read_i16::<LittleEndian>()?,
            trigger: reader.read_i16::<LittleEndian>()?,
            scan_x: reader.read_i32::<LittleEndian>()?,
            scan_y: reader.read_i32::<LittleEndian>()?,
            scan_rx: reader.read_i32::<LittleEndian>()?,
            scan_ry: reader.read_i32::<LittleEndian>()?,
            fifo_typ: reader.read_i16::<LittleEndian>()?,
            epx_div: reader.read_i32::<LittleEndian>()?,
            mod_type_code: reader.read_i16::<LittleEndian>()?,
            mod_fpga_ver: reader.read_i16::<LittleEndian>()?,
            overflow_corr_factor: reader.read_f32::<LittleEndian>()?,
            adc_zoom: reader.read_i32::<LittleEndian>()?,
            cycles: reader.read_i32::<LittleEndian>()?,
        })
    }

    /// Decodes the record. Missing trailing fields read as zero.
    ///
    /// # Errors
    /// Returns [`crate::Error::Io`] if the record cannot be read.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let record: [u8; MEASURE_INFO_SIZE] = padded_record(bytes);
        Ok(Self::read(&mut Cursor::new(&record[..]))?)
    }

    /// Writes the record as its [`MEASURE_INFO_SIZE`] on-disk bytes.
    ///
    /// # Errors
    /// Returns any error from `writer`.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        write_text(writer, &self.time, 9)?;
        write_text(writer, &self.date, 11)?;
        write_text(writer, &self.mod_ser_no, 16)?;
        writer.write_i16::<LittleEndian>(self.meas_mode)?;
        writer.write_f32::<LittleEndian>(self.cfd_ll)?;
        writer.write_f32::<LittleEndian>(self.cfd_lh)?;
        writer.write_f32::<LittleEndian>(self.cfd_zc)?;
        writer.write_f32::<LittleEndian>(self.cfd_hf)?;
        writer.write_f32::<LittleEndian>(self.syn_zc)?;
        writer.write_i16::<LittleEndian>(self.syn_fd)?;
        writer.write_f32::<LittleEndian>(self.syn_hf)?;
        writer.write_f32::<LittleEndian>(self.tac_r)?;
        writer.write_i16::<LittleEndian>(self.tac_g)?;
        writer.write_f32::<LittleEndian>(self.tac_of)?;
        writer.write_f32::<LittleEndian>(self.tac_ll)?;
        writer.write_f32::<LittleEndian>(self.tac_lh)?;
        writer.write_i16::<LittleEndian>(self.adc_re)?;
        writer.write_i16::<LittleEndian>(self.eal_de)?;
        writer.write_i16::<LittleEndian>(self.ncx)?;
        writer.write_i16::<LittleEndian>(self.ncy)?;
        writer.write_i16::<LittleEndian>(self.page)?;
        writer.write_f32::<LittleEndian>(self.col_t)?;
        writer.write_f32::<LittleEndian>(self.rep_t)?;
        writer.write_i16::<LittleEndian>(self.stopt)?;
        writer.write_u8(self.overfl)?;
        writer.write_i16::<LittleEndian>(self.use_motor)?;
        writer.write_i16::<LittleEndian>(self.steps)?;
        writer.write_f32::<LittleEndian>(self.offset)?;
        writer.write_i16::<LittleEndian>(self.dither)?;
        writer.write_i16::<LittleEndian>(self.incr)?;
        writer.write_i16::<LittleEndian>(self.mem_bank)?;
        write_text(writer, &self.mod_type, 16)?;
        writer.write_f32::<LittleEndian>(self.syn_th)?;
        writer.write_i16::<LittleEndian>(self.dead_time_comp)?;
        writer.write_i16::<LittleEndian>(self.polarity_l)?;
        writer.write_i16::<LittleEndian>(self.polarity_f)?;
        writer.write_i16::<LittleEndian>(self.polarity_p)?;
        writer.write_i16::<LittleEndian>(self.linediv)?;
        writer.write_i16::<LittleEndian>(self.accumulate)?;
        writer.write_i32::<LittleEndian>(self.flbck_y)?;
        writer.write_i32::<LittleEndian>(self.flbck_x)?;
        writer.write_i32::<LittleEndian>(self.bord_u)?;
        writer.write_i32::<LittleEndian>(self.bord_l)?;
        writer.write_f32::<LittleEndian>(self.pix_time)?;
        writer.write_i16::<LittleEndian>(self.pix_clk)?;
        writer.write_i16::<LittleEndian>(self.trigger)?;
        writer.write_i32::<LittleEndian>(self.scan_x)?;
        writer.write_i32::<LittleEndian>(self.scan_y)?;
        writer.write_i32::<LittleEndian>(self.scan_rx)?;
        writer.write_i32::<LittleEndian>(self.scan_ry)?;
        writer.write_i16::<LittleEndian>(self.fifo_typ)?;
        writer.write_i32::<LittleEndian>(self.epx_div)?;
        writer.write_i16::<LittleEndian>(self.mod_type_code)?;
        writer.write_i16::<LittleEndian>(self.mod_fpga_ver)?;
        writer.write_f32::<LittleEndian>(self.overflow_corr_factor)?;
        writer.write_i32::<LittleEndian>(self.adc_zoom)?;
        writer.write_i32::<LittleEndian>(self.cycles)?;
        Ok(())
    }

    /// Adds the main acquisition settings to `table` under `MeasureInfo.`.
    pub fn fill_metadata(&self, table: &mut MetadataTable) {
        const P: &str = "MeasureInfo.";
        table.insert(format!("{P}time"), self.time.as_str());
        table.insert(format!("{P}date"), self.date.as_str());
        table.insert(format!("{P}modSerNo"), self.mod_ser_no.as_str());
        table.insert(format!("{P}modType"), self.mod_type.as_str());
        table.insert(format!("{P}modTypeCode"), self.mod_type_code);
        table.insert(format!("{P}measMode"), self.meas_mode);
        table.insert(format!("{P}cfdLL"), self.cfd_ll);
        table.insert(format!("{P}cfdLH"), self.cfd_lh);
        table.insert(format!("{P}cfdZC"), self.cfd_zc);
        table.insert(format!("{P}cfdHF"), self.cfd_hf);
        table.insert(format!("{P}synZC"), self.syn_zc);
        table.insert(format!("{P}synFD"), self.syn_fd);
        table.insert(format!("{P}synHF"), self.syn_hf);
        table.insert(format!("{P}synTH"), self.syn_th);
        table.insert(format!("{P}tacR"), self.tac_r);
        table.insert(format!("{P}tacG"), self.tac_g);
        table.insert(format!("{P}tacOF"), self.tac_of);
        table.insert(format!("{P}tacLL"), self.tac_ll);
        table.insert(format!("{P}tacLH"), self.tac_lh);
        table.insert(format!("{P}adcRE"), self.adc_re);
        table.insert(format!("{P}colT"), self.col_t);
        table.insert(format!("{P}repT"), self.rep_t);
        table.insert(format!("{P}stopt"), self.stopt);
        table.insert(format!("{P}overfl"), self.overfl);
        table.insert(format!("{P}pixTime"), self.pix_time);
        table.insert(format!("{P}scanX"), self.scan_x);
        table.insert(format!("{P}scanY"), self.scan_y);
        table.insert(format!("{P}scanRX"), self.scan_rx);
        table.insert(format!("{P}scanRY"), self.scan_ry);
        table.insert(format!("{P}fifoTyp"), self.fifo_typ);
        table.insert(format!("{P}cycles"), self.cycles);
    }
}

/// Stop condition and rate statistics recorded at the end of a measurement.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MeasStopInfo {
    pub status: u16,
    pub flags: u16,
    pub stop_time: f32,
    pub cur_step: i32,
    pub cur_cycle: i32,
    pub cur_page: i32,
    pub min_sync_rate: f32,
    pub min_cfd_rate: f32,
    pub min_tac_rate: f32,
    pub min_adc_rate: f32,
    pub max_sync_rate: f32,
    pub max_cfd_rate: f32,
    pub max_tac_rate: f32,
    pub max_adc_rate: f32,
    pub reserved1: i32,
    pub reserved2: f32,
}

impl MeasStopInfo {
    /// Reads the record from the current position of `reader`.
    ///
    /// # Errors
    /// Returns an I/O error if the stream ends inside the record.
    pub fn read<R: Read>(reader: &mut R) -> io::Result<Self> {
        Ok(Self {
            status: reader.read_u16::<LittleEndian>()?,
            flags: reader.read_u16::<LittleEndian>()?,
            stop_time: reader.read_f32::<LittleEndian>()?,
            cur_step: reader.read_i32::<LittleEndian>()?,
            cur_cycle: reader.read_i32::<LittleEndian>()?,
            cur_page: reader.read_i32::<LittleEndian>()?,
            min_sync_rate: reader.read_f32::<LittleEndian>()?,
            min_cfd_rate: reader.read_f32::<LittleEndian>()?,
            min_tac_rate: reader.read_f32::<LittleEndian>()?,
            min_adc_rate: reader.read_f32::<LittleEndian>()?,
            max_sync_rate: reader.read_f32::<LittleEndian>()?,
            max_cfd_rate: reader.read_f32::<LittleEndian>()?,
            max_tac_rate: reader.read_f32::<LittleEndian>()?,
            max_adc_rate: reader.read_f32::<LittleEndian>()?,
            reserved1: reader.read_i32::<LittleEndian>()?,
            reserved2: reader.read_f32::<LittleEndian>()?,
        })
    }

    /// Decodes the record. Missing trailing fields read as zero.
    ///
    /// # Errors
    /// Returns [`crate::Error::Io`] if the record cannot be read.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let record: [u8; MEAS_STOP_INFO_SIZE] = padded_record(bytes);
        Ok(Self::read(&mut Cursor::new(&record[..]))?)
    }

    /// Writes the record as its [`MEAS_STOP_INFO_SIZE`] on-disk bytes.
    ///
    /// # Errors
    /// Returns any error from `writer`.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u16::<LittleEndian>(self.status)?;
        writer.write_u16::<LittleEndian>(self.flags)?;
        writer.write_f32::<LittleEndian>(self.stop_time)?;
        writer.write_i32::<LittleEndian>(self.cur_step)?;
        writer.write_i32::<LittleEndian>(self.cur_cycle)?;
        writer.write_i32::<LittleEndian>(self.cur_page)?;
        writer.write_f32::<LittleEndian>(self.min_sync_rate)?;
        writer.write_f32::<LittleEndian>(self.min_cfd_rate)?;
        writer.write_f32::<LittleEndian>(self.min_tac_rate)?;
        writer.write_f32::<LittleEndian>(self.min_adc_rate)?;
        writer.write_f32::<LittleEndian>(self.max_sync_rate)?;
        writer.write_f32::<LittleEndian>(self.max_cfd_rate)?;
        writer.write_f32::<LittleEndian>(self.max_tac_rate)?;
        writer.write_f32::<LittleEndian>(self.max_adc_rate)?;
        writer.write_i32::<LittleEndian>(self.reserved1)?;
        writer.write_f32::<LittleEndian>(self.reserved2)?;
        Ok(())
    }

    pub fn fill_metadata(&self, table: &mut MetadataTable) {
        const P: &str = "MeasStopInfo.";
        table.insert(format!("{P}status"), self.status);
        table.insert(format!("{P}flags"), self.flags);
        table.insert(format!("{P}stopTime"), self.stop_time);
        table.insert(format!("{P}curStep"), self.cur_step);
        table.insert(format!("{P}curCycle"), self.cur_cycle);
        table.insert(format!("{P}curPage"), self.cur_page);
        table.insert(format!("{P}maxSyncRate"), self.max_sync_rate);
        table.insert(format!("{P}maxCfdRate"), self.max_cfd_rate);
        table.insert(format!("{P}maxTacRate"), self.max_tac_rate);
        table.insert(format!("{P}maxAdcRate"), self.max_adc_rate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::ByteOrder;

    fn encode(info: &MeasureInfo) -> Vec<u8> {
        let mut bytes = Vec::new();
        info.write_to(&mut bytes).unwrap();
        bytes
    }

    fn spc830_info() -> MeasureInfo {
        MeasureInfo {
            time: "13:22:14".into(),
            date: "11:28:2007".into(),
            mod_ser_no: "3B0027".into(),
            meas_mode: 9,
            tac_r: 5.0e-8,
            tac_g: 4,
            adc_re: 64,
            mod_type: "SPC-830".into(),
            scan_x: 128,
            scan_y: 128,
            scan_rx: 16,
            scan_ry: 1,
            mod_type_code: 830,
            cycles: 1,
            ..MeasureInfo::default()
        }
    }

    #[test]
    fn test_record_size() {
        assert_eq!(encode(&spc830_info()).len(), MEASURE_INFO_SIZE);

        let mut stop = Vec::new();
        MeasStopInfo::default().write_to(&mut stop).unwrap();
        assert_eq!(stop.len(), MEAS_STOP_INFO_SIZE);
    }

    #[test]
    fn test_field_offsets() {
        let bytes = encode(&spc830_info());
        assert_eq!(LittleEndian::read_i16(&bytes[36..38]), 9);
        assert_eq!(LittleEndian::read_i16(&bytes[68..70]), 4);
        assert_eq!(LittleEndian::read_i16(&bytes[82..84]), 64);
        assert_eq!(LittleEndian::read_i32(&bytes[173..177]), 128);
        assert_eq!(LittleEndian::read_i32(&bytes[181..185]), 16);
    }

    #[test]
    fn test_decode_matches_encode() {
        let info = spc830_info();
        assert_eq!(MeasureInfo::from_bytes(&encode(&info)).unwrap(), info);
    }

    #[test]
    fn test_short_record_defaults_trailing_fields() {
        let bytes = encode(&spc830_info());
        // Older revisions stop before the scan fields
        let short = MeasureInfo::from_bytes(&bytes[..150]).unwrap();
        assert_eq!(short.meas_mode, 9);
        assert_eq!(short.adc_re, 64);
        assert_eq!(short.mod_type, "SPC-830");
        assert_eq!(short.scan_x, 0);
        assert_eq!(short.cycles, 0);
    }

    #[test]
    fn test_stop_info() {
        let mut bytes = vec![0u8; MEAS_STOP_INFO_SIZE];
        LittleEndian::write_u16(&mut bytes[0..2], 3);
        LittleEndian::write_f32(&mut bytes[4..8], 60.0);
        let stop = MeasStopInfo::from_bytes(&bytes).unwrap();
        assert_eq!(stop.status, 3);
        assert_eq!(stop.stop_time, 60.0);

        let mut encoded = Vec::new();
        stop.write_to(&mut encoded).unwrap();
        assert_eq!(encoded, bytes);
    }
}
