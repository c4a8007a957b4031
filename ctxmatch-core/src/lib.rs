//! # ctxmatch-core — Enriquecimento Contextual de Spans por Regras
//!
//! Este crate implementa um matcher contextual para textos em Português Brasileiro:
//! dado um documento tokenizado e um conjunto de padrões de âncora, ele examina o
//! **contexto** ao redor de cada âncora para decidir se ela vira uma entidade final,
//! com quais valores auxiliares, e cobrindo qual trecho. Ele foi projetado para ser
//! didático, modular e extensível.
//!
//! ## Arquitetura do Sistema
//!
//! O sistema segue um fluxo linear por âncora, onde o dado flui e é transformado passo a passo:
//!
//! 1.  **Entrada**: Texto bruto (String).
//! 2.  **Tokenização** ([`tokenizer`]): O texto é dividido em tokens e sentenças, preservando offsets.
//! 3.  **Descoberta** ([`matcher`]): Casadores de frases e de regex localizam as âncoras de cada fonte.
//! 4.  **Contexto** ([`engine`]):
//!     *   **Filtragem**: regras de exclusão/inclusão vetam âncoras pelo contexto ([`config`]).
//!     *   **Atribuição**: regras secundárias extraem valores nas janelas ([`window`]).
//!     *   **Redução**: ocorrências repetidas por chave são reduzidas ([`reduce`]).
//!     *   **Resolução**: a âncora é descartada, substituída ou expandida.
//! 5.  **Saída**: Lista de [`ResultSpan`] com rótulo, fonte e valores atribuídos.
//!
//! ## Exemplo de Uso
//!
//! ```rust
//! use ctxmatch_core::{ContextualMatcher, Document};
//! use ctxmatch_core::patterns::builtin_config;
//!
//! // 1. Compila a configuração (validação acontece aqui, uma única vez)
//! let matcher = ContextualMatcher::new(builtin_config()).unwrap();
//!
//! // 2. Texto para análise
//! let doc = Document::new("Paciente pesa 72,5 kg.");
//!
//! // 3. Executa o matcher
//! let spans = matcher.process(&doc);
//!
//! // 4. Exibe os spans encontrados
//! for span in spans {
//!     println!("{} [{}] assigned={:?}", span.text, span.source, span.assigned);
//! }
//! ```
//!
//! ## Módulos Principais
//!
//! - [`engine`]: O matcher contextual e seus eventos observáveis.
//! - [`config`]: A superfície de configuração e sua validação.
//! - [`document`]: O modelo de documento tokenizado e a projeção de atributos.
//! - [`patterns`]: Configuração de demonstração (medidas clínicas).

pub mod config;
pub mod document;
pub mod engine;
pub mod matcher;
pub mod patterns;
pub mod reduce;
pub mod tokenizer;
pub mod window;

pub use config::{ConfigError, MatcherConfig, SourceConfig};
pub use document::{AlignmentMode, Attr, Document, TokenSpan};
pub use engine::{AssignedValue, ContextualMatcher, MatchEvent, ResultSpan};
pub use tokenizer::Token;
