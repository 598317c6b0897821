#[cfg(test)]
mod tests {
    use super::super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.llm.backend, BackendKind::OpenaiCompatible);
        assert_eq!(config.pipeline.max_concurrent, 4);
        assert_eq!(config.render.dpi, 300);
        assert_eq!(config.search.categories, vec!["cs.CL", "cs.AI", "cs.LG", "cs.IR", "cs.CV"]);
        assert!(config.institutions_path.is_none());
    }

    #[test]
    fn test_sections_override_defaults() {
        let config = Config::from_toml_str(
            r#"
            institutions_path = "institutions.toml"

            [llm]
            backend = "ollama"
            base_url = "http://localhost:11434"

            [models]
            note_model = "qwen2.5:32b"

            [search]
            categories = ["cs.CL"]
            max_results = 50

            [pipeline]
            output_dir = "/tmp/digest"
            max_concurrent = 8
            finalize_with_pending = true

            [render]
            format = "jpeg"
            "#,
        )
        .unwrap();

        assert_eq!(config.llm.backend, BackendKind::Ollama);
        assert_eq!(config.models.note_model, "qwen2.5:32b");
        assert_eq!(config.models.filter_model, default_filter_model());
        assert_eq!(config.search.categories, vec!["cs.CL"]);
        assert_eq!(config.search.page_size, 100);
        assert_eq!(config.pipeline.output_dir, PathBuf::from("/tmp/digest"));
        assert!(config.pipeline.finalize_with_pending);
        assert_eq!(config.render.format, ImageFormat::Jpeg);
        assert_eq!(config.institutions_path, Some(PathBuf::from("institutions.toml")));
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        assert!(Config::from_toml_str("[llm]\nbackend = \"carrier-pigeon\"").is_err());
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        assert!(Config::from_toml_str("[pipeline]\nmax_concurrent = 0").is_err());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.models.note_model, default_note_model());
    }

    #[test]
    fn test_api_key_prefers_file_then_env() {
        let exposed = |key: Option<SecretString>| key.map(|k| k.expose_secret().to_string());

        let mut llm = LlmConfig::default();
        assert_eq!(exposed(llm.resolve_api_key(Some("from-env".to_string()))), Some("from-env".to_string()));
        assert_eq!(exposed(llm.resolve_api_key(None)), None);

        llm.api_key = Some(SecretString::from("from-file"));
        assert_eq!(exposed(llm.resolve_api_key(Some("from-env".to_string()))), Some("from-file".to_string()));

        llm.api_key = Some(SecretString::from(""));
        assert_eq!(exposed(llm.resolve_api_key(Some(String::new()))), None);
    }

    #[test]
    fn test_api_key_is_read_as_secret() {
        let config = Config::from_toml_str("[llm]\napi_key = \"sk-live-123\"").unwrap();
        let key = config.llm.api_key.as_ref().unwrap();
        assert_eq!(key.expose_secret(), "sk-live-123");
        assert!(!format!("{:?}", config).contains("sk-live-123"));
        assert!(!toml::to_string(&config).unwrap().contains("sk-live-123"));
    }

    #[test]
    fn test_llm_timeout() {
        assert_eq!(LlmConfig::default().timeout(), Duration::from_secs(120));
        let config = Config::from_toml_str("[llm]\ntimeout_secs = 5").unwrap();
        assert_eq!(config.llm.timeout(), Duration::from_secs(5));
        assert!(Config::from_toml_str("[llm]\ntimeout_secs = 0").is_err());
    }

    #[test]
    fn test_explicit_path_wins() {
        let path = Config::resolve_path(Some(Path::new("custom.toml")));
        assert_eq!(path, PathBuf::from("custom.toml"));
    }
}
