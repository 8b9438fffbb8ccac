use cotiza_core::config::Settings;
use cotiza_core::{AggregationEngine, AggregationStatus};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Settings pointing the given stores at the mock server.
fn settings_for(server: &MockServer, stores: &[&str]) -> Settings {
    let mut toml = String::new();
    for store in stores {
        toml.push_str(&format!(
            "[providers.{}]\nbase_url = \"{}\"\n\n",
            store,
            server.uri()
        ));
    }
    Settings::from_toml(&toml).unwrap()
}

fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

const DIMEIGGS_SUGGESTIONS: &str = r#"{"data":{"suggestionProducts":{"products":[
    {"productId":"55","productName":"Lápiz Grafito HB","linkText":"lapiz-grafito-hb",
     "items":[{"itemId":"999","images":[{"imageUrl":"/arquivos/ids/999.jpg"}]}]}
]}}}"#;

const DIMEIGGS_CATALOG: &str =
    r#"[{"items":[{"sellers":[{"commertialOffer":{"Price":390.0,"AvailableQuantity":8}}]}]}]"#;

const JAMILA_PAGE: &str = r#"
<div class="productos-mod">
  <a href="/producto-detalle/801"><img src="/img/p/801.jpg"></a>
  <h2>Lápiz grafito Faber 2B</h2>
  <div class="precio-oferta"><h4>$250</h4></div>
</div>
<div class="productos-mod">
  <a href="/producto-detalle/802"><img src="/img/p/802.jpg"></a>
  <h2>Tarro lápices grafito</h2>
  <div class="precio-oferta"><h4>$4.990</h4></div>
</div>"#;

#[tokio::test]
async fn vtex_and_html_stores_merge_into_one_ranking() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/_v/segment/graphql/v1"))
        .and(query_param("operationName", "suggestionProducts"))
        .respond_with(ResponseTemplate::new(200).set_body_string(DIMEIGGS_SUGGESTIONS))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/catalog_system/pub/products/search"))
        .and(query_param("FT", "999"))
        .respond_with(ResponseTemplate::new(200).set_body_string(DIMEIGGS_CATALOG))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "lapiz grafito"))
        .respond_with(ResponseTemplate::new(200).set_body_string(JAMILA_PAGE))
        .mount(&server)
        .await;

    let settings = settings_for(&server, &["dimeiggs", "jamila"]);
    let engine = AggregationEngine::from_settings(&settings).unwrap();
    let result = engine
        .aggregate("lapiz grafito", &ids(&["dimeiggs", "jamila"]), 5, 10)
        .await;

    assert_eq!(result.status, AggregationStatus::Ok);
    assert_eq!(result.providers_queried, ids(&["dimeiggs", "jamila"]));
    // the tarro hit is block-listed
    assert_eq!(result.hits.len(), 2);

    // equal relevance, cheaper first
    assert_eq!(result.hits[0].provider, "jamila");
    assert_eq!(result.hits[0].price, Some(250));
    assert_eq!(result.hits[0].url, format!("{}/producto-detalle/801", server.uri()));

    let dimeiggs = &result.hits[1];
    assert_eq!(dimeiggs.provider, "dimeiggs");
    assert_eq!(dimeiggs.price, Some(390), "price filled by sku lookup");
    assert_eq!(dimeiggs.sku.as_deref(), Some("999"));
    assert_eq!(dimeiggs.url, format!("{}/lapiz-grafito-hb/p", server.uri()));
    assert_eq!(
        dimeiggs.image_url.as_deref(),
        Some(format!("{}/arquivos/ids/999.jpg", server.uri()).as_str())
    );
}

#[tokio::test]
async fn failed_sku_lookup_keeps_the_hit_unpriced() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/_v/segment/graphql/v1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(DIMEIGGS_SUGGESTIONS))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/catalog_system/pub/products/search"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let engine = AggregationEngine::from_settings(&settings_for(&server, &["dimeiggs"])).unwrap();
    let result = engine.aggregate("lapiz grafito", &ids(&["dimeiggs"]), 5, 10).await;
    assert_eq!(result.status, AggregationStatus::Ok);
    assert_eq!(result.hits.len(), 1);
    assert_eq!(result.hits[0].price, None);
}

#[tokio::test]
async fn shopify_store_falls_back_to_collections() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>Sin resultados</body></html>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/collections/escolar"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/collections/papeleria"))
        .and(query_param("q", "carpeta azul"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<div class="card">
                 <img src="/cdn/carpeta.jpg">
                 <a href="/collections/papeleria/products/carpeta-azul-oficio">Carpeta Azul Oficio</a>
                 <span class="price-item">$1.190</span>
               </div>"#,
        ))
        .mount(&server)
        .await;

    let engine =
        AggregationEngine::from_settings(&settings_for(&server, &["libreria_nacional"])).unwrap();
    let result = engine
        .aggregate("carpeta azul", &ids(&["libreria_nacional"]), 5, 10)
        .await;

    assert_eq!(result.status, AggregationStatus::Ok);
    assert_eq!(result.hits.len(), 1);
    let hit = &result.hits[0];
    assert_eq!(hit.url, format!("{}/products/carpeta-azul-oficio", server.uri()));
    assert_eq!(hit.price, Some(1190));
    assert_eq!(hit.relevance, Some(1.0));
}

#[tokio::test]
async fn challenge_pages_and_bad_statuses_are_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/product/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<html><script src=\"/aes.js\"></script><script>slowAES.decrypt(a,2,b,c)</script></html>",
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let engine =
        AggregationEngine::from_settings(&settings_for(&server, &["prisa", "pronobel"])).unwrap();
    let result = engine
        .aggregate("cuaderno", &ids(&["prisa", "pronobel"]), 5, 10)
        .await;

    assert_eq!(result.status, AggregationStatus::Error);
    assert!(result.hits.is_empty());
    assert_eq!(result.error.as_deref(), Some("all providers failed"));
    assert_eq!(result.providers_failed.len(), 2);
    assert_eq!(result.providers_failed[0].provider(), "prisa");
    assert!(result.providers_failed[0].error().contains("JavaScript challenge"));
    assert_eq!(result.providers_failed[1].provider(), "pronobel");
    assert!(result.providers_failed[1].error().contains("503"));
}

#[tokio::test]
async fn blocked_stores_always_fail() {
    let engine = AggregationEngine::from_settings(&Settings::default()).unwrap();
    let result = engine
        .aggregate("arroz", &ids(&["jumbo", "lider"]), 5, 10)
        .await;
    assert_eq!(result.status, AggregationStatus::Error);
    assert!(result.providers_failed[0].error().contains("PerimeterX"));
}
