//! Clock and orbit ephemeris field extraction from GPS LNAV subframes 1-3
//! (spec.md §4.6's field table), grounded on the teacher crate's own
//! `ephemeris.rs` (`nav_decode_lnav_subframe1/2/3`), whose RTKLIB-style bit
//! offsets and scale factors are reused verbatim here.
//!
//! The decode is split across two small frames rather than one monolithic
//! struct because `navigation::Navigation` commits subframes independently
//! as they arrive: [`ClockFrame`] owns everything subframe 1 carries,
//! [`OrbitFrame`] owns subframes 2 and 3. [`Ephemeris`] is the flattened,
//! solver-facing view the two combine into once both are available.

use gnss_rs::sv::SV;
use gnss_rtk::prelude::Epoch;

use crate::util::{getbits, getbits2, getbitu, getbitu2};

const P2_5: f64 = 1.0 / 32.0;
const P2_19: f64 = 1.0 / 524_288.0;
const P2_29: f64 = 1.0 / 536_870_912.0;
const P2_31: f64 = 1.0 / 2_147_483_648.0;
const P2_33: f64 = P2_31 / 4.0;
const P2_43: f64 = P2_33 / 1024.0;
const P2_55: f64 = P2_43 / 4096.0;
const SC2RAD: f64 = std::f64::consts::PI;

/// GPS week-number rollover threshold (spec.md §8 invariant 9): the 10-bit
/// week field transmitted in subframe 1 is modulo-1024; below 524 it is
/// interpreted against the second rollover epoch (+2048), otherwise the
/// first (+1024).
const WEEK_ROLLOVER_THRESHOLD: u32 = 524;

/// Subframe-1 fields: SV clock correction and health/accuracy.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClockFrame {
    pub tow: u32,
    pub week: u32,
    pub code: u32,
    pub sva: u32,
    pub svh: u32,
    pub iodc: u32,
    pub flag: u32,
    pub tgd: f64,
    pub toc: u32,
    pub f0: f64,
    pub f1: f64,
    pub f2: f64,
    pub valid: bool,
}

impl ClockFrame {
    pub fn decode(&mut self, buf: &[u8; 38]) {
        self.tow = getbitu(buf, 30, 17) * 6;
        let week_raw = getbitu(buf, 60, 10);
        self.week = week_raw + if week_raw < WEEK_ROLLOVER_THRESHOLD { 2048 } else { 1024 };
        self.code = getbitu(buf, 70, 2);
        self.sva = getbitu(buf, 72, 4);
        self.svh = getbitu(buf, 76, 6);

        self.iodc = getbitu2(buf, 82, 2, 210, 8);
        self.flag = getbitu(buf, 90, 1);
        self.tgd = getbits(buf, 196, 8) as f64 * P2_31;
        self.toc = getbitu(buf, 218, 16) * 16;
        self.f2 = getbits(buf, 240, 8) as f64 * P2_55;
        self.f1 = getbits(buf, 248, 16) as f64 * P2_43;
        self.f0 = getbits(buf, 270, 22) as f64 * P2_31;
        self.valid = true;

        log::debug!(
            "subframe-1: tow={} week={} sva={} svh={} iodc={} tgd={:+e} toc={} a0={:+e} a1={:+e} a2={:+e}",
            self.tow, self.week, self.sva, self.svh, self.iodc, self.tgd, self.toc, self.f0, self.f1, self.f2,
        );
    }
}

/// Subframes 2 and 3: Keplerian orbital elements and harmonic corrections.
/// `iode_sf2`/`iode_sf3` must agree before `valid` is set (spec.md §4.6's
/// cross-subframe consistency check) — the comparison itself lives in
/// `navigation::Navigation::commit_subframe`, which sets `valid`.
#[derive(Debug, Default, Clone, Copy)]
pub struct OrbitFrame {
    pub tow: u32,
    pub iode_sf2: u32,
    pub iode_sf3: u32,
    pub crs: f64,
    pub deln: f64,
    pub m0: f64,
    pub cuc: f64,
    pub ecc: f64,
    pub cus: f64,
    pub a: f64,
    pub toe: u32,
    pub fit: u32,
    pub cic: f64,
    pub omg0: f64,
    pub i0: f64,
    pub cis: f64,
    pub crc: f64,
    pub omg: f64,
    pub omg_dot: f64,
    pub i_dot: f64,
    pub valid: bool,
}

impl OrbitFrame {
    pub fn decode_subframe2(&mut self, buf: &[u8; 38]) {
        self.tow = getbitu(buf, 30, 17) * 6;
        self.iode_sf2 = getbitu(buf, 60, 8);
        self.crs = getbits(buf, 68, 16) as f64 * P2_5;
        self.deln = getbits(buf, 90, 16) as f64 * P2_43 * SC2RAD;
        self.m0 = getbits2(buf, 106, 8, 120, 24) as f64 * P2_31 * SC2RAD;
        self.cuc = getbits(buf, 150, 16) as f64 * P2_29;
        self.ecc = getbitu2(buf, 166, 8, 180, 24) as f64 * P2_33;
        self.cus = getbits(buf, 210, 16) as f64 * P2_29;
        let sqrt_a = getbitu2(buf, 226, 8, 240, 24) as f64 * P2_19;
        self.toe = getbitu(buf, 270, 16) * 16;
        self.fit = getbitu(buf, 286, 1);
        self.a = sqrt_a * sqrt_a;

        log::debug!(
            "subframe-2: tow={} a={} iode={} crs={} cuc={:+e} cus={:+e} ecc={} m0={} toe={}",
            self.tow, self.a, self.iode_sf2, self.crs, self.cuc, self.cus, self.ecc, self.m0, self.toe,
        );
    }

    pub fn decode_subframe3(&mut self, buf: &[u8; 38]) {
        self.tow = getbitu(buf, 30, 17) * 6;
        self.cic = getbits(buf, 60, 16) as f64 * P2_29;
        self.omg0 = getbits2(buf, 76, 8, 90, 24) as f64 * P2_31 * SC2RAD;
        self.i0 = getbits2(buf, 136, 8, 150, 24) as f64 * P2_31 * SC2RAD;
        self.cis = getbits(buf, 120, 16) as f64 * P2_29;
        self.crc = getbits(buf, 180, 16) as f64 * P2_5;
        self.omg = getbits2(buf, 196, 8, 210, 24) as f64 * P2_31 * SC2RAD;
        self.omg_dot = getbits(buf, 240, 24) as f64 * P2_43 * SC2RAD;
        self.iode_sf3 = getbitu(buf, 270, 8);
        self.i_dot = getbits(buf, 278, 14) as f64 * P2_43 * SC2RAD;

        log::debug!(
            "subframe-3: tow={} cic={:+e} cis={:+e} omg={} omg0={} omgd={:+e} i0={} idot={:+e}",
            self.tow, self.cic, self.cis, self.omg, self.omg0, self.omg_dot, self.i0, self.i_dot,
        );
    }
}

/// Flattened clock+orbit ephemeris for one SV, the shape the position
/// solver consumes. Assembled once both `ClockFrame` and `OrbitFrame` are
/// `valid`; `tow_gpst`/`toe_gpst` are resolved to absolute epochs by the
/// caller, which alone knows the current GPS week context.
#[derive(Clone, Copy)]
pub struct Ephemeris {
    pub sv: SV,
    pub tow: u32,
    pub cn0: f64,
    pub code_off_sec: f64,
    pub ts_sec: f64,
    pub tow_gpst: Epoch,
    pub toe_gpst: Epoch,
    pub tlm: u32,

    pub iode: u32,
    pub iodc: u32,
    pub sva: u32,
    pub svh: u32,
    pub week: u32,
    pub code: u32,
    pub flag: u32,
    pub tgd: f64,
    pub f0: f64,
    pub f1: f64,
    pub f2: f64,
    pub omg: f64,
    pub omg0: f64,
    pub omg_dot: f64,
    pub cic: f64,
    pub cis: f64,
    pub crc: f64,
    pub crs: f64,
    pub cuc: f64,
    pub cus: f64,
    pub i_dot: f64,
    pub i0: f64,
    pub m0: f64,
    pub a: f64,
    pub ecc: f64,
    pub deln: f64,
    pub toc: u32,
    pub toe: u32,
    pub fit: u32,
}

impl Ephemeris {
    /// Combine a clock and an orbit frame already established to refer to
    /// the same satellite and the same ephemeris set (`iode_sf2 ==
    /// iode_sf3`). `tow_gpst`/`toe_gpst`/`ts_sec`/`cn0`/`code_off_sec` are
    /// the receiver-side context the solver needs on top of the decoded
    /// navigation fields.
    #[allow(clippy::too_many_arguments)]
    pub fn combine(
        sv: SV,
        clock: &ClockFrame,
        orbit: &OrbitFrame,
        tow_gpst: Epoch,
        toe_gpst: Epoch,
        ts_sec: f64,
        cn0: f64,
        code_off_sec: f64,
    ) -> Self {
        Ephemeris {
            sv,
            tow: clock.tow,
            cn0,
            code_off_sec,
            ts_sec,
            tow_gpst,
            toe_gpst,
            tlm: 0,
            iode: orbit.iode_sf2,
            iodc: clock.iodc,
            sva: clock.sva,
            svh: clock.svh,
            week: clock.week,
            code: clock.code,
            flag: clock.flag,
            tgd: clock.tgd,
            f0: clock.f0,
            f1: clock.f1,
            f2: clock.f2,
            omg: orbit.omg,
            omg0: orbit.omg0,
            omg_dot: orbit.omg_dot,
            cic: orbit.cic,
            cis: orbit.cis,
            crc: orbit.crc,
            crs: orbit.crs,
            cuc: orbit.cuc,
            cus: orbit.cus,
            i_dot: orbit.i_dot,
            i0: orbit.i0,
            m0: orbit.m0,
            a: orbit.a,
            ecc: orbit.ecc,
            deln: orbit.deln,
            toc: clock.toc,
            toe: orbit.toe,
            fit: orbit.fit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pack(words: &[u32; 10]) -> [u8; 38] {
        crate::util::pack_subframe_bytes(words)
    }

    #[test]
    fn week_rollover_rule_matches_threshold() {
        let mut words = [0u32; 10];
        words[2] = 100 << 20; // week field at bits 60..70, value 100 (< 524)
        let mut clock = ClockFrame::default();
        clock.decode(&pack(&words));
        assert_eq!(clock.week, 100 + 2048);

        let mut words = [0u32; 10];
        words[2] = 900 << 20; // value 900 (>= 524)
        let mut clock = ClockFrame::default();
        clock.decode(&pack(&words));
        assert_eq!(clock.week, 900 + 1024);
    }

    #[test]
    fn subframe1_decodes_tow() {
        let mut words = [0u32; 10];
        words[1] = 123 << 13; // tow field occupies bits 30..47, scaled by 6 on decode
        let mut clock = ClockFrame::default();
        clock.decode(&pack(&words));
        assert_eq!(clock.tow, 123 * 6);
    }
}
