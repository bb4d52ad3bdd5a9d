use utoipa::OpenApi;
use crate::modules::podcast::dto::*;
use crate::modules::podcast::model::{Episode, ItemKind, Show};
use crate::modules::progress::model::ProgressRecord;

#[derive(OpenApi)]
#[openapi(
    info(title = "podcast-ingest", description = "Podcast episode and show metadata cache"),
    paths(
        crate::modules::podcast::handler::ingest_podcast_info,
        crate::modules::podcast::handler::get_podcast_info,
        crate::modules::podcast::handler::list_podcast_infos,
        crate::modules::progress::handler::get_ingestion_status,
    ),
    components(
        schemas(
            ItemKind, Episode, Show,
            PodcastInfoResponse, PodcastInfoListResponse, IngestionAccepted,
            ProgressRecord,
        )
    ),
    tags(
        (name = "Podcast", description = "Episode and show metadata"),
        (name = "Ingestion", description = "Background ingestion progress")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_every_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        assert!(paths.iter().any(|p| p.as_str() == "/api/v1/podcast_info/{kind}/{id}"));
        assert!(paths.iter().any(|p| p.as_str() == "/api/v1/podcast_info"));
        assert!(paths.iter().any(|p| p.as_str() == "/api/v1/ingestions/{correlation_id}"));
    }
}
