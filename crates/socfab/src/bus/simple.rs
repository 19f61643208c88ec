//! Simple synchronous (Wishbone-style) bus link.
//!
//! The master raises a request (`cyc`/`stb`) and holds it unchanged until the
//! slave acknowledges. Only one transaction is ever outstanding on a link.

/// Request phase: `adr`, `dat_w`, `sel`, `we`, with `cyc`/`stb` implied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimpleRequest {
    /// Word-aligned byte address
    pub adr: u64,
    pub dat_w: u128,
    pub sel: u16,
    pub we: bool,
}

impl SimpleRequest {
    pub fn read(adr: u64, sel: u16) -> Self {
        Self {
            adr,
            dat_w: 0,
            sel,
            we: false,
        }
    }

    pub fn write(adr: u64, dat_w: u128, sel: u16) -> Self {
        Self {
            adr,
            dat_w,
            sel,
            we: true,
        }
    }
}

/// Acknowledge phase: `ack` (or `err`) with `dat_r`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimpleResponse {
    pub dat_r: u128,
    pub err: bool,
}

impl SimpleResponse {
    pub fn ack(dat_r: u128) -> Self {
        Self { dat_r, err: false }
    }

    pub fn error() -> Self {
        Self {
            dat_r: 0,
            err: true,
        }
    }
}

/// Point-to-point simple bus connection
#[derive(Debug, Clone, Default)]
pub struct SimpleLink {
    req: Option<SimpleRequest>,
    resp: Option<SimpleResponse>,
}

impl SimpleLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Master side: raise a request. Refused while one is outstanding.
    pub fn issue(&mut self, req: SimpleRequest) -> bool {
        if self.req.is_some() {
            return false;
        }
        self.req = Some(req);
        true
    }

    /// The asserted request, acknowledged or not
    pub fn request(&self) -> Option<&SimpleRequest> {
        self.req.as_ref()
    }

    /// A request is asserted and still waiting for its acknowledge
    pub fn awaiting_ack(&self) -> Option<&SimpleRequest> {
        match self.resp {
            Some(_) => None,
            None => self.req.as_ref(),
        }
    }

    /// Slave side: acknowledge the asserted request
    pub fn acknowledge(&mut self, resp: SimpleResponse) -> bool {
        if self.req.is_none() || self.resp.is_some() {
            return false;
        }
        self.resp = Some(resp);
        true
    }

    pub fn has_response(&self) -> bool {
        self.resp.is_some()
    }

    /// Master side: observe the acknowledge and drop the request
    pub fn complete(&mut self) -> Option<SimpleResponse> {
        let resp = self.resp.take()?;
        self.req = None;
        Some(resp)
    }

    pub fn is_idle(&self) -> bool {
        self.req.is_none() && self.resp.is_none()
    }
}
