//! This contains test scenarios that a given [TaxonService] needs to pass.
//! We use [rstest] and [rstest_reuse] to provide all services we want to test
//! against, and then apply this template to all test functions.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use rstest::*;
use rstest_reuse::{self, *};

use super::TaxonService;
use crate::fixtures::{
    self, AVES, CHORDATA, EUKARYOTA, HOMO_SAPIENS, INSECTA, MAMMALIA, METAZOA,
};
use crate::{Error, RankQuery, SortOrder, TaxonRecord};

pub mod utils;
use self::utils::{make_http_taxon_service, InstrumentedTaxonService};

fn taxids(records: &[TaxonRecord]) -> Vec<&str> {
    records.iter().map(|r| r.taxid.as_str()).collect()
}

/// This produces a template, which will be applied to all individual test functions.
/// See https://github.com/la10736/rstest/issues/130#issuecomment-968864832
#[template]
#[rstest]
#[case::memory(Arc::new(fixtures::memory_taxonomy()) as Arc<dyn TaxonService>)]
#[case::http(make_http_taxon_service(Arc::new(fixtures::memory_taxonomy())).await)]
pub fn taxon_services(#[case] taxon_service: impl TaxonService) {}

/// Asking for a taxon that doesn't exist returns Ok(None).
#[apply(taxon_services)]
#[tokio::test]
async fn get_non_exist(taxon_service: impl TaxonService) {
    assert_eq!(Ok(None), taxon_service.get("0").await);
}

#[apply(taxon_services)]
#[tokio::test]
async fn get(taxon_service: impl TaxonService) {
    assert_eq!(
        Some(HOMO_SAPIENS.clone()),
        taxon_service.get(&HOMO_SAPIENS.taxid).await.unwrap()
    );
}

/// Children come back in backend order, unsorted.
#[apply(taxon_services)]
#[tokio::test]
async fn children(taxon_service: impl TaxonService) {
    let children = taxon_service.children(&CHORDATA.taxid).await.unwrap();
    assert_eq!(vec![AVES.clone(), MAMMALIA.clone()], children);
}

/// A leaf has an empty list of children, not an error.
#[apply(taxon_services)]
#[tokio::test]
async fn children_of_leaf(taxon_service: impl TaxonService) {
    assert_eq!(
        Ok(vec![]),
        taxon_service.children(&HOMO_SAPIENS.taxid).await
    );
}

#[apply(taxon_services)]
#[tokio::test]
async fn children_of_unknown(taxon_service: impl TaxonService) {
    assert_eq!(
        Err(Error::NotFound("0".to_string())),
        taxon_service.children("0").await
    );
}

/// Ancestors are ordered from the root down to the parent.
#[apply(taxon_services)]
#[tokio::test]
async fn ancestors(taxon_service: impl TaxonService) {
    let lineage = taxon_service.ancestors(&HOMO_SAPIENS.taxid).await.unwrap();
    assert_eq!(vec!["2759", "33208", "7711", "40674"], taxids(&lineage));

    assert_eq!(
        Ok(vec![]),
        taxon_service.ancestors(&EUKARYOTA.taxid).await
    );
}

#[apply(taxon_services)]
#[tokio::test]
async fn rank_frequencies(taxon_service: impl TaxonService) {
    let frequencies = taxon_service.rank_frequencies().await.unwrap();

    assert_eq!(Some(&3), frequencies.get("class"));
    assert_eq!(Some(&2), frequencies.get("kingdom"));
    assert_eq!(Some(&1), frequencies.get("superkingdom"));
    assert_eq!(None, frequencies.get("order"));
}

#[apply(taxon_services)]
#[tokio::test]
async fn list_by_rank(taxon_service: impl TaxonService) {
    let page = taxon_service
        .list_by_rank(&RankQuery::new("class").limit(2))
        .await
        .unwrap();
    assert_eq!(3, page.total);
    assert_eq!(0, page.offset);
    assert_eq!(vec!["40674", "8782"], taxids(&page.results));
    assert!(page.has_more());

    let page = taxon_service
        .list_by_rank(&RankQuery::new("class").limit(2).offset(2))
        .await
        .unwrap();
    assert_eq!(3, page.total);
    assert_eq!(2, page.offset);
    assert_eq!(vec![INSECTA.taxid.as_str()], taxids(&page.results));
    assert!(!page.has_more());
}

#[apply(taxon_services)]
#[tokio::test]
async fn list_by_rank_ascending(taxon_service: impl TaxonService) {
    let page = taxon_service
        .list_by_rank(&RankQuery::new("class").sort("scientific_name", SortOrder::Ascending))
        .await
        .unwrap();
    assert_eq!(vec!["8782", "50557", "40674"], taxids(&page.results));
}

#[apply(taxon_services)]
#[tokio::test]
async fn list_unknown_rank(taxon_service: impl TaxonService) {
    let page = taxon_service
        .list_by_rank(&RankQuery::new("order"))
        .await
        .unwrap();
    assert_eq!(0, page.total);
    assert!(page.results.is_empty());
}

#[apply(taxon_services)]
#[tokio::test]
async fn search(taxon_service: impl TaxonService) {
    let page = taxon_service.search("MeTa", 10).await.unwrap();
    assert_eq!(vec![METAZOA.clone()], page.results);

    let page = taxon_service.search("9606", 10).await.unwrap();
    assert_eq!(vec![HOMO_SAPIENS.clone()], page.results);

    let page = taxon_service.search("nothing like this", 10).await.unwrap();
    assert!(page.results.is_empty());
}

/// Failures on the server side surface as network errors on the client.
#[tokio::test]
async fn http_server_error() {
    let backend = InstrumentedTaxonService::new(fixtures::memory_taxonomy());
    backend.fail("children:2759");
    let taxon_service = make_http_taxon_service(Arc::new(backend)).await;

    assert!(matches!(
        taxon_service.children("2759").await,
        Err(Error::Network(_))
    ));
    // other taxa are unaffected
    assert_eq!(
        2,
        taxon_service.children("33208").await.unwrap().len()
    );
}

/// Nothing listening at all.
#[tokio::test]
async fn http_unreachable() {
    let taxon_service = super::HttpTaxonService::new(
        url::Url::parse("http://127.0.0.1:1/api/").unwrap(),
    );

    assert!(matches!(
        taxon_service.get("2759").await,
        Err(Error::Network(_))
    ));
}

/// A base URL pointing at the wrong path must not look like an empty
/// taxonomy.
#[tokio::test]
async fn http_wrong_base_url() {
    let served = make_http_taxon_service(Arc::new(fixtures::memory_taxonomy())).await;
    let taxon_service =
        super::HttpTaxonService::new(served.base_url().join("../elsewhere/").unwrap());

    assert!(matches!(
        taxon_service.rank_frequencies().await,
        Err(Error::Network(_))
    ));
    assert!(matches!(
        taxon_service.list_by_rank(&RankQuery::new("class")).await,
        Err(Error::Network(_))
    ));
}
