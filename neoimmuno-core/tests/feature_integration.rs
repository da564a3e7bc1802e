//! Load a TESLA-style table from disk, engineer features and write them back.

use neoimmuno_core::data::{FeatureTable, load_tesla};
use neoimmuno_core::features::FeatureRecord;
use neoimmuno_core::{CoreError, PositionModel, compute_features};
use pretty_assertions::assert_eq;
use std::io::Write;

const TESLA_CSV: &str = "\
ALT_EPI_SEQ,MHC,VALIDATED,PEP_LEN,MUTATION_POSITION,PATIENT_ID,NETMHC_PAN_BINDING_AFFINITY,BINDING_STABILITY,TUMOR_ABUNDANCE,FRAC_HYDROPHOBIC,AGRETOPICITY,FOREIGNNESS
SIINFEKLV,A*02:01,True,9,5,1,45.2,1.3,12.0,0.44,0.8,1e-5
KLGGALQAKV,A*03:01,False,10,10,1,512.0,0.2,,0.3,1.1,0
GILGFVFTL,B*08:01,False,9,,2,18.9,,4.5,0.67,,
YLQPRTFLL,A*24:02,True,9,14,3,220.0,0.9,88.1,0.56,0.95,0.2
";

fn write_fixture() -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(TESLA_CSV.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn load_and_engineer_tesla_fixture() {
    let fixture = write_fixture();
    let records = load_tesla(fixture.path()).unwrap();
    assert_eq!(records.len(), 4);
    assert_eq!(
        records.iter().map(|r| r.allele.as_str()).collect::<Vec<_>>(),
        vec!["HLA-A*02:01", "HLA-A*03:01", "HLA-B*08:01", "HLA-A*24:02"]
    );

    let table = FeatureTable::from_peptides(&records, &PositionModel::default());
    assert_eq!(table.n_rows(), 4);

    // Row 2 has no position; row 3 has one beyond the peptide.
    let anchor = table.column("mut_at_anchor").unwrap();
    assert_eq!(anchor[0], 0.0);
    assert_eq!(anchor[1], 1.0);
    assert!(anchor[2].is_nan());
    assert!(anchor[3].is_nan());

    // Whole-peptide features never depend on the mutation position.
    let global = table.column("peptide_hydrophobicity_mean").unwrap();
    assert!(global.iter().all(|v| !v.is_nan()));
}

#[test]
fn table_matches_direct_computation() {
    let fixture = write_fixture();
    let records = load_tesla(fixture.path()).unwrap();
    let table = FeatureTable::from_peptides(&records, &PositionModel::default());

    for (i, record) in records.iter().enumerate() {
        let direct = compute_features(
            &record.peptide,
            record.mutation_position,
            &record.allele,
            record.peptide_length,
        );
        for (name, value) in direct.entries() {
            let from_table = table.column(name).unwrap()[i];
            assert_eq!(value.to_bits(), from_table.to_bits(), "{name} row {i}");
        }
    }
}

#[test]
fn feature_csv_has_keys_and_schema() {
    let fixture = write_fixture();
    let records = load_tesla(fixture.path()).unwrap();
    let table = FeatureTable::from_features(
        &records
            .iter()
            .map(|r| compute_features(&r.peptide, r.mutation_position, &r.allele, r.peptide_length))
            .collect::<Vec<_>>(),
    );

    let out = tempfile::NamedTempFile::new().unwrap();
    let keys = vec![(
        "peptide",
        records.iter().map(|r| r.peptide.clone()).collect::<Vec<_>>(),
    )];
    table
        .write_csv(std::fs::File::create(out.path()).unwrap(), &keys)
        .unwrap();

    let mut reader = csv::Reader::from_path(out.path()).unwrap();
    let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
    let mut expected = vec!["peptide".to_string()];
    expected.extend(FeatureRecord::columns().into_iter().map(String::from));
    assert_eq!(headers, expected);
    assert_eq!(reader.records().count(), 4);
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_tesla(&dir.path().join("absent.csv")).unwrap_err();
    assert!(matches!(err, CoreError::Io(_)));
}
