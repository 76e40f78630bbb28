use crate::taxonservice::{MemoryTaxonService, TaxonEntry};
use crate::TaxonRecord;
use lazy_static::lazy_static;

fn taxon(taxid: &str, name: &str, rank: &str, annotations: u64) -> TaxonRecord {
    let mut record = TaxonRecord::new(taxid)
        .with_name(name)
        .with_rank(rank)
        .with_annotations(annotations);
    record.organisms_count = annotations / 10;
    record.assemblies_count = annotations / 2;
    record
}

lazy_static! {
    pub static ref EUKARYOTA: TaxonRecord = taxon("2759", "Eukaryota", "superkingdom", 1000);
    pub static ref VIRIDIPLANTAE: TaxonRecord = taxon("33090", "Viridiplantae", "kingdom", 100);
    pub static ref METAZOA: TaxonRecord = taxon("33208", "Metazoa", "kingdom", 900);
    pub static ref CHORDATA: TaxonRecord = taxon("7711", "Chordata", "phylum", 850);
    pub static ref ARTHROPODA: TaxonRecord = taxon("6656", "Arthropoda", "phylum", 50);
    pub static ref MAMMALIA: TaxonRecord = taxon("40674", "Mammalia", "class", 600);
    pub static ref AVES: TaxonRecord = taxon("8782", "Aves", "class", 250);
    pub static ref INSECTA: TaxonRecord = taxon("50557", "Insecta", "class", 50);
    pub static ref HOMO_SAPIENS: TaxonRecord = taxon("9606", "Homo sapiens", "species", 500);
    pub static ref MUS_MUSCULUS: TaxonRecord = taxon("10090", "Mus musculus", "species", 100);

    /// A small slice of the tree of life, stored child-to-parent.
    /// Siblings are deliberately not in annotation order, so consumers have
    /// to sort them.
    pub static ref TAXONOMY: Vec<TaxonEntry> = vec![
        entry(&EUKARYOTA, None),
        entry(&VIRIDIPLANTAE, Some(&EUKARYOTA)),
        entry(&METAZOA, Some(&EUKARYOTA)),
        entry(&ARTHROPODA, Some(&METAZOA)),
        entry(&CHORDATA, Some(&METAZOA)),
        entry(&AVES, Some(&CHORDATA)),
        entry(&MAMMALIA, Some(&CHORDATA)),
        entry(&INSECTA, Some(&ARTHROPODA)),
        entry(&MUS_MUSCULUS, Some(&MAMMALIA)),
        entry(&HOMO_SAPIENS, Some(&MAMMALIA)),
    ];
}

fn entry(record: &TaxonRecord, parent: Option<&TaxonRecord>) -> TaxonEntry {
    TaxonEntry {
        record: record.clone(),
        parent: parent.map(|p| p.taxid.clone()),
    }
}

/// Returns a [MemoryTaxonService] populated with [TAXONOMY].
pub fn memory_taxonomy() -> MemoryTaxonService {
    TAXONOMY.iter().cloned().collect()
}
