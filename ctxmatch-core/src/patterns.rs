//! # Padrões de Demonstração — Medidas Clínicas em PT-BR
//!
//! Configuração embutida usada pelos testes de integração e pela interface web.
//! Cobre medidas comuns de evolução clínica (peso, altura, pressão arterial,
//! dose de medicamento), cada uma mostrando um recurso diferente do matcher:
//! janelas, exclusão por contexto, políticas de redução e `span_getter`.
//!
//! Os padrões de regex são escritos na forma normalizada (minúsculas, sem
//! acento), porque o casamento padrão usa o atributo `Norm`.

use crate::config::{AssignRule, ConstraintRule, MatcherConfig, ReduceMode, SourceConfig, WindowSpec};
use crate::document::{AlignmentMode, Attr};
use crate::matcher::RegexFlags;

/// Configuração de demonstração: medidas clínicas em notas de evolução.
pub fn builtin_config() -> MatcherConfig {
    MatcherConfig {
        label: "medida".to_string(),
        sources: vec![
            // Peso: âncora por termos, valor numérico à direita, com exclusão
            // de pesos estimados/referidos (não aferidos)
            SourceConfig {
                source: "peso".to_string(),
                terms: vec![
                    "pesa".to_string(),
                    "pesando".to_string(),
                    "peso".to_string(),
                ],
                exclude: vec![ConstraintRule {
                    regex: vec!["estimado".to_string(), "referido".to_string()],
                    window: Some(WindowSpec::Pair(-3, 3)),
                    ..ConstraintRule::default()
                }],
                assign: vec![AssignRule {
                    name: "valor".to_string(),
                    regex: Some(r"(\d+(?:,\d+)?) ?(?:kg|quilos?)".to_string()),
                    window: Some(WindowSpec::Single(4)),
                    ..AssignRule::default()
                }],
                ..SourceConfig::default()
            },
            // Altura: mesmo formato, valor em metros ou centímetros
            SourceConfig {
                source: "altura".to_string(),
                terms: vec!["mede".to_string(), "altura".to_string()],
                assign: vec![AssignRule {
                    name: "valor".to_string(),
                    regex: Some(r"(\d+(?:,\d+)?) ?(?:m|cm|metros?)".to_string()),
                    window: Some(WindowSpec::Single(4)),
                    ..AssignRule::default()
                }],
                ..SourceConfig::default()
            },
            // Pressão arterial: várias aferições na mesma sentença são comuns;
            // keep_last fica com a mais recente (a mais à direita)
            SourceConfig {
                source: "pressao".to_string(),
                terms: vec![
                    "pressão arterial".to_string(),
                    "pressão".to_string(),
                ],
                assign: vec![AssignRule {
                    name: "valor".to_string(),
                    regex: Some(r"(\d{2,3} ?x ?\d{2,3})".to_string()),
                    window: Some(WindowSpec::Single(6)),
                    reduce_mode: Some(ReduceMode::KeepLast),
                    ..AssignRule::default()
                }],
                ..SourceConfig::default()
            },
            // Dose: âncora por regex; o medicamento vem de spans já extraídos
            // por outro componente, registrados no grupo "medicamentos"
            SourceConfig {
                source: "dose".to_string(),
                regex: vec![r"\d+(?:,\d+)? ?mg".to_string()],
                assign: vec![AssignRule {
                    name: "medicamento".to_string(),
                    span_getter: Some("medicamentos".to_string()),
                    window: Some(WindowSpec::Single(-6)),
                    ..AssignRule::default()
                }],
                ..SourceConfig::default()
            },
        ],
        attr: Attr::Norm,
        regex_flags: RegexFlags::default(),
        ignore_excluded: false,
        ignore_space_tokens: false,
        alignment_mode: AlignmentMode::Expand,
        include_assigned: false,
        assign_as_span: false,
    }
}

/// Textos de demonstração para a interface web, por domínio.
pub fn demo_texts() -> Vec<(&'static str, &'static str)> {
    vec![
        (
            "evolução",
            "Paciente em bom estado geral. Pesa 72,5 kg e mede 1,68 m. \
             Pressão arterial 120x80 na admissão, 130x85 no momento.",
        ),
        (
            "prescrição",
            "Prescrita dipirona 500 mg de 6 em 6 horas. Mantida losartana 50 mg ao dia.",
        ),
        (
            "exclusão",
            "Peso estimado em 80 kg pela equipe. Na balança, pesa 78 kg.",
        ),
        (
            "ambulatório",
            "Retorna para controle. Nega queixas. Pressão 110x70. Peso 65 kg, estável.",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::engine::{AssignedValue, ContextualMatcher};

    #[test]
    fn test_config_embutida_compila() {
        assert!(ContextualMatcher::new(builtin_config()).is_ok());
    }

    #[test]
    fn test_peso_e_altura() {
        let matcher = ContextualMatcher::new(builtin_config()).unwrap();
        let doc = Document::new("Pesa 72,5 kg e mede 1,68 m.");
        let spans = matcher.process(&doc);

        let peso = spans.iter().find(|s| s.source == "peso").unwrap();
        assert_eq!(
            peso.assigned.get("valor"),
            Some(&AssignedValue::Texts(vec!["72,5".to_string()]))
        );
        let altura = spans.iter().find(|s| s.source == "altura").unwrap();
        assert_eq!(
            altura.assigned.get("valor"),
            Some(&AssignedValue::Texts(vec!["1,68".to_string()]))
        );
    }

    #[test]
    fn test_pressao_keep_last() {
        let matcher = ContextualMatcher::new(builtin_config()).unwrap();
        let doc = Document::new("Pressão arterial 120x80 na admissão , 130x85 agora");
        let spans = matcher.process(&doc);

        // Duas âncoras ("pressão arterial" e "pressão"); ambas reduzem
        // para a aferição mais à direita
        assert!(!spans.is_empty());
        for span in spans.iter().filter(|s| s.source == "pressao") {
            assert_eq!(
                span.assigned.get("valor"),
                Some(&AssignedValue::Text("130x85".to_string()))
            );
        }
    }

    #[test]
    fn test_exclusao_de_peso_estimado() {
        let matcher = ContextualMatcher::new(builtin_config()).unwrap();
        let doc = Document::new("Peso estimado em 80 kg pela equipe.");
        let spans = matcher.process(&doc);
        assert!(spans.iter().all(|s| s.source != "peso"));
    }

    #[test]
    fn test_demo_texts_processam_sem_erro() {
        let matcher = ContextualMatcher::new(builtin_config()).unwrap();
        for (_, text) in demo_texts() {
            let doc = Document::new(text);
            // Nenhum texto de demonstração deve quebrar o processamento
            let _ = matcher.process(&doc);
        }
    }
}
