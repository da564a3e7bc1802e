//! TESLA benchmark loader (CSV export of Wells et al. 2020, Table S4).

use super::{HeaderIndex, field, parse_bool, parse_f64, parse_i64};
use crate::error::CoreError;
use crate::record::{Covariates, PeptideRecord, normalize_allele};
use std::io;
use std::path::Path;
use tracing::{debug, info};

const REQUIRED: [&str; 6] = [
    "peptide",
    "allele",
    "immunogenic",
    "peptide_length",
    "mutation_position",
    "patient_id",
];

/// Map a raw TESLA header to the canonical column name.
fn canonical_column(raw: &str) -> String {
    let mapped = match raw {
        "ALT_EPI_SEQ" => "peptide",
        "MHC" => "allele",
        "VALIDATED" => "immunogenic",
        "PEP_LEN" => "peptide_length",
        "MEASURED_BINDING_AFFINITY" => "binding_affinity",
        "NETMHC_PAN_BINDING_AFFINITY" => "predicted_affinity",
        "TUMOR_ABUNDANCE" => "tumor_abundance",
        "BINDING_STABILITY" => "binding_stability",
        "FRAC_HYDROPHOBIC" => "frac_hydrophobic",
        "AGRETOPICITY" => "agretopicity",
        "FOREIGNNESS" => "foreignness",
        "MUTATION_POSITION" => "mutation_position",
        "PATIENT_ID" => "patient_id",
        "TISSUE_TYPE" => "tissue_type",
        other => return other.to_string(),
    };
    mapped.to_string()
}

/// Load a TESLA table from disk.
pub fn load_tesla(path: &Path) -> Result<Vec<PeptideRecord>, CoreError> {
    let file = std::fs::File::open(path)?;
    let records = read_tesla(file)?;
    info!(
        path = %path.display(),
        records = records.len(),
        positives = records.iter().filter(|r| r.immunogenic == Some(true)).count(),
        "Loaded TESLA table"
    );
    Ok(records)
}

/// Parse a TESLA table from any reader.
///
/// Accepts canonical or raw TESLA headers, adds the `HLA-` prefix to alleles
/// and rejects rows whose declared length disagrees with the sequence.
pub fn read_tesla<R: io::Read>(reader: R) -> Result<Vec<PeptideRecord>, CoreError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let index = HeaderIndex::new(&headers, canonical_column);
    for name in REQUIRED {
        index.require(name)?;
    }
    let col = |name: &str| index.require(name);
    let (peptide_idx, allele_idx, label_idx) = (col("peptide")?, col("allele")?, col("immunogenic")?);
    let (length_idx, position_idx, patient_idx) = (
        col("peptide_length")?,
        col("mutation_position")?,
        col("patient_id")?,
    );
    let covariate_idx: Vec<Option<usize>> =
        Covariates::COLUMNS.iter().map(|c| index.get(c)).collect();

    let mut records = Vec::new();
    for (row, result) in csv_reader.records().enumerate() {
        let raw = result?;

        let peptide = field(&raw, peptide_idx).trim().to_string();
        if peptide.is_empty() {
            return Err(CoreError::invalid_value(row, "peptide", "empty sequence"));
        }
        let allele = normalize_allele(field(&raw, allele_idx));

        let label = parse_bool(field(&raw, label_idx), row, "immunogenic")?
            .ok_or_else(|| CoreError::invalid_value(row, "immunogenic", "missing label"))?;
        let length = parse_i64(field(&raw, length_idx), row, "peptide_length")?
            .and_then(|v| usize::try_from(v).ok())
            .ok_or_else(|| CoreError::invalid_value(row, "peptide_length", "missing length"))?;
        let position = parse_i64(field(&raw, position_idx), row, "mutation_position")?;

        let patient = field(&raw, patient_idx).trim();
        if patient.is_empty() {
            return Err(CoreError::invalid_value(row, "patient_id", "missing group key"));
        }

        let mut values = [f64::NAN; 7];
        for (slot, (idx, name)) in values
            .iter_mut()
            .zip(covariate_idx.iter().zip(Covariates::COLUMNS))
        {
            if let Some(idx) = idx {
                *slot = parse_f64(field(&raw, *idx), row, name)?;
            }
        }
        let [
            predicted_affinity,
            binding_affinity,
            binding_stability,
            tumor_abundance,
            frac_hydrophobic,
            agretopicity,
            foreignness,
        ] = values;

        let record = PeptideRecord::new(peptide, allele)
            .with_length(length)
            .map_err(|e| CoreError::invalid_value(row, "peptide_length", e.to_string()))?
            .with_mutation_position(position)
            .with_label(label)
            .with_patient(patient)
            .with_covariates(Covariates {
                predicted_affinity,
                binding_affinity,
                binding_stability,
                tumor_abundance,
                frac_hydrophobic,
                agretopicity,
                foreignness,
            });
        records.push(record);
    }

    debug!(rows = records.len(), "Parsed TESLA rows");
    Ok(records)
}
