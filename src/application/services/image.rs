//! Image resolution: ensure a template's image exists locally, building it
//! on demand.

use std::path::Path;

use tracing::{debug, info};

use crate::application::ports::ImageStore;
use crate::domain::WorkspaceError;
use crate::domain::template::TemplateProfile;

/// Make sure the profile's image reference is available locally.
///
/// Lists locally known image tags first; when the reference is absent, builds
/// it from the profile's build-context directory and blocks until the engine
/// reports completion. Overlapping builds of the same image are not
/// deduplicated: two concurrent first launches of a never-built template may
/// each run a build, and late failures are retryable.
///
/// # Errors
///
/// Returns [`WorkspaceError::ImageBuildFailed`] when the build fails, or the
/// engine error from the image listing.
pub async fn ensure_image(
    engine: &impl ImageStore,
    profile: &TemplateProfile,
) -> Result<(), WorkspaceError> {
    if engine.image_exists(profile.image).await? {
        debug!(image = profile.image, "image already present");
        return Ok(());
    }

    info!(
        image = profile.image,
        context = profile.build_context,
        "image missing, building from template context"
    );
    engine
        .build_image(profile.image, Path::new(profile.build_context))
        .await?;
    info!(image = profile.image, "image built");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Mutex;

    use super::*;
    use crate::domain::template::TemplateCatalog;

    struct ImageStoreSpy {
        present: bool,
        build_error: Option<String>,
        built: Mutex<Vec<(String, PathBuf)>>,
    }

    impl ImageStoreSpy {
        fn new(present: bool) -> Self {
            Self {
                present,
                build_error: None,
                built: Mutex::new(Vec::new()),
            }
        }
    }

    impl ImageStore for ImageStoreSpy {
        async fn image_exists(&self, _reference: &str) -> Result<bool, WorkspaceError> {
            Ok(self.present)
        }

        async fn build_image(
            &self,
            reference: &str,
            context_dir: &Path,
        ) -> Result<(), WorkspaceError> {
            if let Some(detail) = &self.build_error {
                return Err(WorkspaceError::ImageBuildFailed {
                    image: reference.to_string(),
                    detail: detail.clone(),
                });
            }
            self.built
                .lock()
                .expect("lock")
                .push((reference.to_string(), context_dir.to_path_buf()));
            Ok(())
        }
    }

    fn python_profile() -> &'static TemplateProfile {
        TemplateCatalog::builtin().resolve("python").expect("python")
    }

    #[tokio::test]
    async fn present_image_skips_the_build() {
        let engine = ImageStoreSpy::new(true);
        ensure_image(&engine, python_profile()).await.expect("ok");
        assert!(engine.built.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn missing_image_builds_from_the_template_context() {
        let engine = ImageStoreSpy::new(false);
        ensure_image(&engine, python_profile()).await.expect("ok");
        let built = engine.built.lock().expect("lock");
        assert_eq!(
            *built,
            vec![(
                "podbay-python:latest".to_string(),
                PathBuf::from("docker/python")
            )]
        );
    }

    #[tokio::test]
    async fn build_failure_surfaces_the_engine_detail() {
        let engine = ImageStoreSpy {
            build_error: Some("step 4/9 failed: apt update".into()),
            ..ImageStoreSpy::new(false)
        };
        let err = ensure_image(&engine, python_profile())
            .await
            .expect_err("build should fail");
        match err {
            WorkspaceError::ImageBuildFailed { image, detail } => {
                assert_eq!(image, "podbay-python:latest");
                assert!(detail.contains("step 4/9"));
            }
            other => panic!("expected ImageBuildFailed, got {other:?}"),
        }
    }
}
