#[cfg(test)]
mod tests {
    use super::super::*;

    #[test]
    fn crag_defaults_match_spec() {
        let c = CragConfig::default();
        assert_eq!(c.max_iterations, 3);
        assert_eq!(c.max_discard_ratio, 0.55);
        assert!(c.min_confidence_floor <= c.min_avg_quality_for_sufficient);
    }

    #[test]
    fn session_default_ttl_is_one_hour() {
        let s = SessionConfig::default();
        assert_eq!(s.ttl_secs, 3600);
    }

    #[test]
    fn effective_threshold_never_drops_below_floor() {
        let c = CragConfig::default();
        for iteration in 0..=c.max_iterations {
            let raw = c.min_avg_quality_for_sufficient
                - (iteration as f64) * c.confidence_decay_rate
                - c.max_memory_boost;
            let effective = raw.max(c.min_confidence_floor);
            assert!(effective >= c.min_confidence_floor);
        }
    }
}
