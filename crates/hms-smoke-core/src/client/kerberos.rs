//! GSSAPI (Kerberos) SASL mechanism.
//!
//! The metastore principal is `<service>/<principal host>@REALM`. The host part
//! differs from the pod DNS name the client connects to, see
//! [`KerberosConfig::principal_host`]. Credentials come from the default
//! credential cache (`kinit` or a keytab referenced by `KRB5_CLIENT_KTNAME`).

use crate::client::sasl::SaslMechanism;
use crate::config::KerberosConfig;
use crate::Result;

/// SASL mechanism name.
pub const GSSAPI: &str = "GSSAPI";

/// GSS host-based service name, `service@host`.
pub fn gss_service_name(config: &KerberosConfig, host: &str) -> String {
    format!("{}@{}", config.service_name, config.principal_host(host))
}

/// Build the GSSAPI mechanism for `host`.
#[cfg(feature = "kerberos")]
pub fn gssapi_mechanism(config: &KerberosConfig, host: &str) -> Result<Box<dyn SaslMechanism>> {
    let service = gss_service_name(config, host);
    tracing::debug!(service = %service, "Initialising GSSAPI context");
    Ok(Box::new(gssapi::GssapiMechanism::new(&service)?))
}

/// Build the GSSAPI mechanism for `host`.
#[cfg(not(feature = "kerberos"))]
pub fn gssapi_mechanism(config: &KerberosConfig, host: &str) -> Result<Box<dyn SaslMechanism>> {
    Err(crate::Error::Config(format!(
        "cannot authenticate as {}: hms-smoke was built without the `kerberos` feature",
        gss_service_name(config, host)
    )))
}

#[cfg(feature = "kerberos")]
mod gssapi {
    use super::GSSAPI;
    use crate::client::sasl::SaslMechanism;
    use crate::{MetastoreError, Result};
    use libgssapi::context::{ClientCtx, CtxFlags, SecurityContext};
    use libgssapi::credential::{Cred, CredUsage};
    use libgssapi::name::Name;
    use libgssapi::oid::{OidSet, GSS_MECH_KRB5, GSS_NT_HOSTBASED_SERVICE};

    /// Security layer bit for "no protection" (RFC 4752, section 3.3).
    const LAYER_NONE: u8 = 0x01;

    fn gss_error(e: libgssapi::error::Error) -> crate::Error {
        MetastoreError::Sasl(format!("GSSAPI: {}", e)).into()
    }

    enum State {
        /// Exchanging context tokens
        Context,
        /// Context established, waiting for the server's security layer offer
        SecurityLayer,
        Complete,
    }

    pub(super) struct GssapiMechanism {
        ctx: ClientCtx,
        state: State,
    }

    impl GssapiMechanism {
        pub(super) fn new(service: &str) -> Result<Self> {
            let name =
                Name::new(service.as_bytes(), Some(&GSS_NT_HOSTBASED_SERVICE)).map_err(gss_error)?;
            let name = name.canonicalize(Some(&GSS_MECH_KRB5)).map_err(gss_error)?;

            let mut mechs = OidSet::new().map_err(gss_error)?;
            mechs.add(&GSS_MECH_KRB5).map_err(gss_error)?;
            let cred =
                Cred::acquire(None, None, CredUsage::Initiate, Some(&mechs)).map_err(gss_error)?;

            let ctx = ClientCtx::new(
                Some(cred),
                name,
                CtxFlags::GSS_C_MUTUAL_FLAG | CtxFlags::GSS_C_SEQUENCE_FLAG,
                Some(&GSS_MECH_KRB5),
            );

            Ok(Self {
                ctx,
                state: State::Context,
            })
        }

        fn step(&mut self, token: Option<&[u8]>) -> Result<Vec<u8>> {
            let out = self.ctx.step(token, None).map_err(gss_error)?;
            if self.ctx.is_complete() {
                self.state = State::SecurityLayer;
            }
            Ok(out.map(|buf| buf.to_vec()).unwrap_or_default())
        }

        fn answer_security_layer(&mut self, challenge: &[u8]) -> Result<Vec<u8>> {
            let offer = self.ctx.unwrap(challenge).map_err(gss_error)?;
            if offer.len() != 4 {
                return Err(MetastoreError::Sasl(format!(
                    "security layer offer has {} bytes, expected 4",
                    offer.len()
                ))
                .into());
            }
            if offer[0] & LAYER_NONE == 0 {
                return Err(MetastoreError::Sasl(
                    "server requires integrity or confidentiality protection".into(),
                )
                .into());
            }

            let response = self
                .ctx
                .wrap(false, &[LAYER_NONE, 0, 0, 0])
                .map_err(gss_error)?;
            self.state = State::Complete;
            Ok(response.to_vec())
        }
    }

    impl SaslMechanism for GssapiMechanism {
        fn name(&self) -> &str {
            GSSAPI
        }

        fn initial_response(&mut self) -> Result<Vec<u8>> {
            self.step(None)
        }

        fn evaluate_challenge(&mut self, challenge: &[u8]) -> Result<Vec<u8>> {
            match self.state {
                State::Context => self.step(Some(challenge)),
                State::SecurityLayer => self.answer_security_layer(challenge),
                State::Complete => Err(MetastoreError::Sasl(
                    "challenge received after GSSAPI completed".into(),
                )
                .into()),
            }
        }

        fn is_complete(&self) -> bool {
            matches!(self.state, State::Complete)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gss_service_name() {
        let config = KerberosConfig::default();
        assert_eq!(
            gss_service_name(
                &config,
                "hive-metastore-default-0.hive-metastore-default.ns.svc.cluster.local"
            ),
            "hive@hive.ns.svc.cluster.local"
        );
    }

    #[cfg(not(feature = "kerberos"))]
    #[test]
    fn test_mechanism_requires_feature() {
        let err = gssapi_mechanism(&KerberosConfig::default(), "localhost")
            .err()
            .unwrap();
        assert!(matches!(err, crate::Error::Config(_)));
        assert!(err.to_string().contains("kerberos"));
    }
}
