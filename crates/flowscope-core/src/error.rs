use thiserror::Error;

/// Erros comuns da biblioteca Flowscope
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Erro de comunicação com o node de execução (JSON-RPC)
    #[error("Erro de RPC: {0}")]
    RpcError(String),

    /// Erro de transporte HTTP (conexão, timeout do cliente, leitura do corpo)
    #[error("Erro HTTP: {0}")]
    HttpError(String),

    /// Nenhum upstream candidato respondeu com sucesso
    #[error("Upstream indisponível: {0}")]
    UpstreamUnavailable(String),

    /// O caminho falhou recentemente e está em backoff
    #[error("{0}")]
    BackingOff(String),

    /// Erro de decodificação de dados
    #[error("Erro de decodificação: {0}")]
    DecodeError(String),

    /// Erro de codificação de dados
    #[error("Erro de codificação: {0}")]
    EncodeError(String),

    /// Erro de validação
    #[error("Erro de validação: {0}")]
    ValidationError(String),

    /// Erro de timeout
    #[error("Timeout: {0}")]
    TimeoutError(String),

    /// Recurso não encontrado
    #[error("Não encontrado: {0}")]
    NotFound(String),

    /// Erro genérico
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Indica se o erro representa indisponibilidade do upstream
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Error::RpcError(_)
                | Error::HttpError(_)
                | Error::UpstreamUnavailable(_)
                | Error::BackingOff(_)
                | Error::DecodeError(_)
                | Error::TimeoutError(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::DecodeError(err.to_string())
    }
}

/// Tipo de resultado usado em toda a biblioteca
pub type Result<T> = std::result::Result<T, Error>;
