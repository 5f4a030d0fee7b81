use crate::error::{PkiError, Result};

/// Convert a single PEM block into its DER contents, checking the label.
pub fn pem_to_der(pem_str: &str, label: &str) -> Result<Vec<u8>> {
    let pem = pem::parse(pem_str)?;
    if pem.tag() != label {
        return Err(PkiError::DecodingError(format!(
            "expected PEM block {label:?}, found {:?}",
            pem.tag()
        )));
    }
    Ok(pem.contents().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_mismatch() {
        let block = pem::encode(&pem::Pem::new("PRIVATE KEY", vec![1, 2, 3]));
        assert_eq!(pem_to_der(&block, "PRIVATE KEY").unwrap(), vec![1, 2, 3]);
        assert!(matches!(
            pem_to_der(&block, "CERTIFICATE"),
            Err(PkiError::DecodingError(_))
        ));
    }

    #[test]
    fn test_not_pem() {
        assert!(pem_to_der("garbage", "CERTIFICATE").is_err());
    }
}
