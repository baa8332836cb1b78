//! Beamforming trace CSV sinks
//!
//! Write-only diagnostic outputs, one file per training phase. The
//! simulation never reads these back.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use wigig_core::training::TrainingRole;
use wigig_core::types::{AntennaId, AwvId, SectorId, StationId};
use wigig_core::SimTime;

/// Result type for trace-writing operations.
pub type TraceResult<T> = Result<T, std::io::Error>;

/// CSV sinks for the beamforming training phases.
#[derive(Debug)]
pub struct BeamformingTraceWriter {
    sls: BufWriter<File>,
    brp: BufWriter<File>,
    trace_id: u64,
}

impl BeamformingTraceWriter {
    /// Create `sls.csv` and `brp.csv` under `directory`, writing the header
    /// rows immediately.
    pub fn create<P: AsRef<Path>>(directory: P) -> TraceResult<Self> {
        let dir = directory.as_ref();
        std::fs::create_dir_all(dir)?;

        let mut sls = BufWriter::new(File::create(dir.join("sls.csv"))?);
        writeln!(
            sls,
            "TIME,TRACE_ID,SRC_ID,DST_ID,BFT_ID,ANTENNA_ID,SECTOR_ID,ROLE,BSS_ID,SINR_DB"
        )?;

        let mut brp = BufWriter::new(File::create(dir.join("brp.csv"))?);
        writeln!(brp, "TIME,TRACE_ID,SRC_ID,DST_ID,ANTENNA_ID,SECTOR_ID,AWV_ID,SINR_DB")?;

        Ok(Self {
            sls,
            brp,
            trace_id: 0,
        })
    }

    /// Append one SLS completion row.
    #[allow(clippy::too_many_arguments)]
    pub fn log_sls(
        &mut self,
        time: SimTime,
        src: StationId,
        dst: StationId,
        bft_id: u64,
        antenna: AntennaId,
        sector: SectorId,
        role: TrainingRole,
        bss_id: u16,
        sinr_db: f64,
    ) -> TraceResult<()> {
        let role = match role {
            TrainingRole::Initiator => "INITIATOR",
            TrainingRole::Responder => "RESPONDER",
        };
        writeln!(
            self.sls,
            "{:.9},{},{},{},{},{},{},{},{},{:.3}",
            time.as_secs_f64(),
            self.trace_id,
            src.0,
            dst.0,
            bft_id,
            antenna.0,
            sector.0,
            role,
            bss_id,
            sinr_db
        )?;
        self.trace_id += 1;
        Ok(())
    }

    /// Append one BRP refinement row.
    #[allow(clippy::too_many_arguments)]
    pub fn log_brp(
        &mut self,
        time: SimTime,
        src: StationId,
        dst: StationId,
        antenna: AntennaId,
        sector: SectorId,
        awv: AwvId,
        sinr_db: f64,
    ) -> TraceResult<()> {
        writeln!(
            self.brp,
            "{:.9},{},{},{},{},{},{},{:.3}",
            time.as_secs_f64(),
            self.trace_id,
            src.0,
            dst.0,
            antenna.0,
            sector.0,
            awv.0,
            sinr_db
        )?;
        self.trace_id += 1;
        Ok(())
    }

    /// Flush both sinks.
    pub fn flush(&mut self) -> TraceResult<()> {
        self.sls.flush()?;
        self.brp.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sls_trace_columns() {
        let dir =
            std::env::temp_dir().join(format!("wigig-trace-{}", std::process::id()));
        let mut writer = BeamformingTraceWriter::create(&dir).unwrap();
        writer
            .log_sls(
                SimTime::from_millis(12),
                StationId(1),
                StationId(2),
                0,
                AntennaId(1),
                SectorId(5),
                TrainingRole::Initiator,
                0,
                21.375,
            )
            .unwrap();
        writer.flush().unwrap();

        let contents = std::fs::read_to_string(dir.join("sls.csv")).unwrap();
        let mut lines = contents.lines();
        assert_eq!(
            lines.next().unwrap(),
            "TIME,TRACE_ID,SRC_ID,DST_ID,BFT_ID,ANTENNA_ID,SECTOR_ID,ROLE,BSS_ID,SINR_DB"
        );
        let row = lines.next().unwrap();
        assert!(row.starts_with("0.012"));
        assert!(row.contains("INITIATOR"));
        assert!(row.ends_with("21.375"));
    }
}
